//! PLC directory client.
//!
//! `Directory` is the seam the DID manager calls through; `HttpDirectory` is
//! the production implementation over the wire protocol in §6. Tests
//! substitute an in-memory or mockito-backed directory.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::error::{PlcError, Result};

/// The last accepted operation for a DID, as returned by `/<did>/log/last`.
#[derive(Debug, Clone, Deserialize)]
pub struct LastOperation {
    pub cid: String,
    pub operation: serde_json::Value,
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// `POST /`: submit a genesis operation.
    async fn create_did(&self, signed_op: &serde_json::Value) -> Result<serde_json::Value>;

    /// `POST /<did>`: submit a non-genesis operation.
    async fn update_did(&self, did: &str, signed_op: &serde_json::Value) -> Result<serde_json::Value>;

    /// `GET /<did>`: resolve the current DID document.
    async fn resolve_did(&self, did: &str) -> Result<serde_json::Value>;

    /// `GET /<did>/log/last`: the current head, or `None` if the DID has no
    /// operations yet.
    async fn get_last_operation(&self, did: &str) -> Result<Option<LastOperation>>;

    /// `GET /<did>/log/audit`: the full audit log.
    async fn get_audit_log(&self, did: &str) -> Result<Vec<serde_json::Value>>;
}

/// A `reqwest`-backed client against a real PLC directory.
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDirectory {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlcError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PlcError::Config(format!("invalid directory path {path}: {e}")))
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(self.url(path)?)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;
        Self::into_ack(response).await
    }

    async fn get(&self, path: &str) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(self.url(path)?)
            .header("Accept", "application/json")
            .send()
            .await?;
        Self::into_ack(response).await
    }

    /// Map a response per §6: empty success bodies become
    /// `{success: true, http_code}`; 4xx/5xx map to `DirectoryError` with the
    /// message drawn from `error`, then `message`, then the raw body text.
    async fn into_ack(response: reqwest::Response) -> Result<serde_json::Value> {
        let status = response.status();
        let http_code = status.as_u16();
        let text = response.text().await?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(serde_json::json!({ "success": true, "http_code": http_code }));
            }
            return serde_json::from_str(&text).map_err(PlcError::from);
        }

        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(text);

        Err(PlcError::DirectoryError { status: http_code, message })
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn create_did(&self, signed_op: &serde_json::Value) -> Result<serde_json::Value> {
        self.post("/", signed_op).await
    }

    async fn update_did(&self, did: &str, signed_op: &serde_json::Value) -> Result<serde_json::Value> {
        self.post(&format!("/{did}"), signed_op).await
    }

    async fn resolve_did(&self, did: &str) -> Result<serde_json::Value> {
        self.get(&format!("/{did}")).await
    }

    async fn get_last_operation(&self, did: &str) -> Result<Option<LastOperation>> {
        let value = self.get(&format!("/{did}/log/last")).await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some).map_err(PlcError::from)
    }

    async fn get_audit_log(&self, did: &str) -> Result<Vec<serde_json::Value>> {
        let value = self.get(&format!("/{did}/log/audit")).await?;
        match value {
            serde_json::Value::Array(entries) => Ok(entries),
            other => Ok(vec![other]),
        }
    }
}
