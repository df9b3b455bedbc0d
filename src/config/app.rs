use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PlcError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlcClientConfig {
    pub directory: DirectoryConfig,
    pub keystore: KeyStoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyStoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
}

impl Default for PlcClientConfig {
    fn default() -> Self {
        Self {
            directory: DirectoryConfig {
                base_url: "https://plc.directory".to_string(),
                request_timeout_seconds: 10,
            },
            keystore: KeyStoreConfig { path: PathBuf::from("data/plc-keys.json") },
            logging: LoggingConfig { level: "info".to_string(), format: "pretty".to_string() },
        }
    }
}

impl PlcClientConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("PLC").separator("__"))
            .build()
            .map_err(|e| PlcError::Config(format!("failed to load config: {e}")))?;

        config.try_deserialize().map_err(|e| PlcError::Config(format!("failed to parse config: {e}")))
    }

    pub fn from_env() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("PLC").separator("__"))
            .build()
            .map_err(|e| PlcError::Config(format!("failed to load environment config: {e}")))?;

        let mut base_config = Self::default();
        if let Ok(env_config) = config.try_deserialize::<PlcClientConfig>() {
            base_config = env_config;
        }
        Ok(base_config)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.directory.base_url)
            .map_err(|e| PlcError::Config(format!("invalid directory base URL: {e}")))?;

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(PlcError::Config(format!("invalid log level: {other}"))),
        }

        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            other => return Err(PlcError::Config(format!("unsupported log format: {other}"))),
        }

        tracing::info!("configuration validation passed");
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.directory.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PlcClientConfig::default().validate().unwrap();
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = PlcClientConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        let mut config = PlcClientConfig::default();
        config.directory.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
