//! Local key-store: a single durable JSON file of per-DID key records.
//! Private keys are stored multibase-encoded in cleartext; protecting the
//! file is the caller's responsibility.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub private: String,
    pub public: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub did: String,
    pub rotation_key: KeyMaterial,
    pub verification_key: KeyMaterial,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deactivated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyStoreDocument {
    #[serde(default)]
    dids: BTreeMap<String, KeyRecord>,
}

#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn put(&self, record: KeyRecord) -> Result<()>;
    async fn get(&self, did: &str) -> Result<Option<KeyRecord>>;
    async fn update_keys(&self, did: &str, rotation_key: KeyMaterial, verification_key: KeyMaterial) -> Result<()>;
    async fn update_metadata(&self, did: &str, metadata: serde_json::Value) -> Result<()>;
    async fn deactivate(&self, did: &str) -> Result<()>;
    async fn list(&self) -> Result<Vec<KeyRecord>>;
    async fn delete(&self, did: &str) -> Result<()>;
}

/// A `KeyStore` backed by a single JSON document on disk. Writes go through
/// a write-then-rename so a crash mid-write never leaves a torn file. An
/// in-process mutex serializes read-modify-write cycles; the rename itself
/// is what makes a single write atomic to other readers.
pub struct FileKeyStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: tokio::sync::Mutex::new(()) }
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    async fn read_document(&self) -> Result<KeyStoreDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(KeyStoreDocument::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(KeyStoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, doc: &KeyStoreDocument) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp_path = Self::tmp_path(&self.path);
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn put(&self, record: KeyRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        doc.dids.insert(record.did.clone(), record);
        self.write_document(&doc).await
    }

    async fn get(&self, did: &str) -> Result<Option<KeyRecord>> {
        let doc = self.read_document().await?;
        Ok(doc.dids.get(did).cloned())
    }

    async fn update_keys(&self, did: &str, rotation_key: KeyMaterial, verification_key: KeyMaterial) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        let record = doc
            .dids
            .get_mut(did)
            .ok_or_else(|| crate::error::PlcError::MissingLocalKey(did.to_string()))?;
        record.rotation_key = rotation_key;
        record.verification_key = verification_key;
        record.updated_at = Utc::now();
        self.write_document(&doc).await
    }

    async fn update_metadata(&self, did: &str, metadata: serde_json::Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        let record = doc
            .dids
            .get_mut(did)
            .ok_or_else(|| crate::error::PlcError::MissingLocalKey(did.to_string()))?;
        record.metadata = metadata;
        record.updated_at = Utc::now();
        self.write_document(&doc).await
    }

    async fn deactivate(&self, did: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        let record = doc
            .dids
            .get_mut(did)
            .ok_or_else(|| crate::error::PlcError::MissingLocalKey(did.to_string()))?;
        record.active = false;
        record.deactivated_at = Some(Utc::now());
        record.updated_at = Utc::now();
        self.write_document(&doc).await
    }

    async fn list(&self) -> Result<Vec<KeyRecord>> {
        let doc = self.read_document().await?;
        Ok(doc.dids.into_values().collect())
    }

    async fn delete(&self, did: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        doc.dids.remove(did);
        self.write_document(&doc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(did: &str) -> KeyRecord {
        let now = Utc::now();
        KeyRecord {
            did: did.to_string(),
            rotation_key: KeyMaterial { private: "zPRIV".into(), public: "zPUB".into() },
            verification_key: KeyMaterial { private: "zPRIV2".into(), public: "zPUB2".into() },
            type_: None,
            active: true,
            created_at: now,
            updated_at: now,
            deactivated_at: None,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("keys.json"));
        store.put(sample_record("did:plc:abc")).await.unwrap();

        let record = store.get("did:plc:abc").await.unwrap().unwrap();
        assert_eq!(record.rotation_key.public, "zPUB");
    }

    #[tokio::test]
    async fn missing_did_update_fails_with_missing_local_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("keys.json"));
        let err = store
            .update_keys("did:plc:nope", KeyMaterial { private: "a".into(), public: "b".into() }, KeyMaterial { private: "c".into(), public: "d".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::PlcError::MissingLocalKey(_)));
    }

    #[tokio::test]
    async fn deactivate_marks_inactive_and_stamps_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("keys.json"));
        store.put(sample_record("did:plc:abc")).await.unwrap();
        store.deactivate("did:plc:abc").await.unwrap();

        let record = store.get("did:plc:abc").await.unwrap().unwrap();
        assert!(!record.active);
        assert!(record.deactivated_at.is_some());
    }

    #[tokio::test]
    async fn list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("keys.json"));
        store.put(sample_record("did:plc:a")).await.unwrap();
        store.put(sample_record("did:plc:b")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);

        store.delete("did:plc:a").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn document_survives_no_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("does-not-exist.json"));
        assert!(store.list().await.unwrap().is_empty());
    }
}
