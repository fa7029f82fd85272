use serde::Deserialize;
use std::time::Duration;

/// Which blob storage implementation backs the service
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    Azure,
    Local,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Storage account name (required for the azure backend)
    #[serde(default)]
    pub blob_account_name: Option<String>,

    /// Base64-encoded storage account shared key (required for the azure backend)
    #[serde(default)]
    pub blob_account_key: Option<String>,

    /// Container holding the serving artifacts
    #[serde(default = "default_container_name")]
    pub blob_container_name: String,

    /// Endpoint override, e.g. for a local storage emulator
    #[serde(default)]
    pub blob_endpoint: Option<String>,

    #[serde(default = "default_backend")]
    pub blob_backend: BlobBackend,

    /// Directory used by the local backend
    #[serde(default = "default_local_dir")]
    pub blob_local_dir: String,

    /// Upper bound on a single blob transfer, in seconds
    #[serde(default = "default_storage_timeout_secs")]
    pub storage_timeout_secs: u64,

    /// Extra attempts for uploads triggered by article registration
    #[serde(default = "default_upload_retries")]
    pub upload_retries: u32,

    /// Delay before the first upload retry, doubled on each further attempt
    #[serde(default = "default_upload_backoff_ms")]
    pub upload_backoff_ms: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_container_name() -> String {
    "mycontentdata".to_string()
}

fn default_backend() -> BlobBackend {
    BlobBackend::Azure
}

fn default_local_dir() -> String {
    "./data".to_string()
}

fn default_storage_timeout_secs() -> u64 {
    30
}

fn default_upload_retries() -> u32 {
    2
}

fn default_upload_backoff_ms() -> u64 {
    200
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Persistence knobs shared by the blob store and the article registrar
    pub fn persistence(&self) -> PersistenceSettings {
        PersistenceSettings {
            timeout: Duration::from_secs(self.storage_timeout_secs),
            upload_retries: self.upload_retries,
            upload_backoff: Duration::from_millis(self.upload_backoff_ms),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Timeout and retry policy applied to blob transfers
#[derive(Debug, Clone, Copy)]
pub struct PersistenceSettings {
    pub timeout: Duration,
    pub upload_retries: u32,
    pub upload_backoff: Duration,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(default_storage_timeout_secs()),
            upload_retries: default_upload_retries(),
            upload_backoff: Duration::from_millis(default_upload_backoff_ms()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()));
        envy::from_iter::<_, Config>(vars).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.blob_container_name, "mycontentdata");
        assert_eq!(config.blob_backend, BlobBackend::Azure);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.persistence().upload_retries, 2);
        assert!(config.blob_account_name.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("BLOB_ACCOUNT_NAME", "acct"),
            ("BLOB_CONTAINER_NAME", "other"),
            ("BLOB_BACKEND", "local"),
            ("STORAGE_TIMEOUT_SECS", "5"),
            ("PORT", "8080"),
        ]);
        assert_eq!(config.blob_account_name.as_deref(), Some("acct"));
        assert_eq!(config.blob_container_name, "other");
        assert_eq!(config.blob_backend, BlobBackend::Local);
        assert_eq!(config.persistence().timeout, Duration::from_secs(5));
        assert_eq!(config.port, 8080);
    }
}
