use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{BlobBackend, Config, PersistenceSettings};
use crate::error::{AppError, AppResult};

pub mod azure;
pub mod local;
pub mod memory;

pub use azure::AzureBlobStore;
pub use local::LocalBlobStore;
pub use memory::InMemoryBlobStore;

/// Serialized prediction model (read-only)
pub const MODEL_BLOB: &str = "svdpp_model.pkl";
/// Article metadata table (read-write)
pub const ARTICLES_BLOB: &str = "articles_metadata.csv";
/// Embedding matrix (read-write)
pub const EMBEDDINGS_BLOB: &str = "articles_embeddings.pickle";
/// Historical click log (read-only)
pub const CLICKS_BLOB: &str = "clicks_sample.csv";

/// Named byte blobs in a storage container
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetches the full contents of a blob
    async fn download(&self, name: &str) -> AppResult<Bytes>;

    /// Writes a blob, replacing any existing contents
    async fn upload(&self, name: &str, data: Bytes) -> AppResult<()>;

    /// Human-readable location for logging
    fn describe(&self) -> String;
}

/// Builds the blob store selected by configuration
pub fn from_config(config: &Config) -> AppResult<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.blob_backend {
        BlobBackend::Azure => {
            let account = config.blob_account_name.clone().ok_or_else(|| {
                AppError::Config("BLOB_ACCOUNT_NAME must be set".to_string())
            })?;
            let key = config.blob_account_key.as_deref().ok_or_else(|| {
                AppError::Config("BLOB_ACCOUNT_KEY must be set".to_string())
            })?;
            Arc::new(AzureBlobStore::new(
                account,
                key,
                config.blob_container_name.clone(),
                config.blob_endpoint.clone(),
                Duration::from_secs(config.storage_timeout_secs),
            )?)
        }
        BlobBackend::Local => Arc::new(LocalBlobStore::new(&config.blob_local_dir)),
    };

    tracing::info!(store = %store.describe(), "Blob store configured");
    Ok(store)
}

/// Downloads a blob, failing with a storage error if it takes longer than `timeout`
pub async fn download_with_timeout(
    store: &dyn BlobStore,
    name: &str,
    timeout: Duration,
) -> AppResult<Bytes> {
    match tokio::time::timeout(timeout, store.download(name)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Storage(format!(
            "download of {} timed out after {:?}",
            name, timeout
        ))),
    }
}

/// Uploads a blob with a per-attempt timeout, retrying with exponential backoff
pub async fn upload_with_retry(
    store: &dyn BlobStore,
    name: &str,
    data: Bytes,
    settings: &PersistenceSettings,
) -> AppResult<()> {
    let mut delay = settings.upload_backoff;
    let mut attempt: u32 = 0;

    loop {
        let result = match tokio::time::timeout(settings.timeout, store.upload(name, data.clone()))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::Storage(format!(
                "upload of {} timed out after {:?}",
                name, settings.timeout
            ))),
        };

        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt < settings.upload_retries => {
                attempt += 1;
                tracing::warn!(
                    blob = name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Blob upload failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "upload of {} failed after {} attempt(s): {}",
                    name,
                    attempt + 1,
                    e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn fast_settings(retries: u32) -> PersistenceSettings {
        PersistenceSettings {
            timeout: Duration::from_millis(50),
            upload_retries: retries,
            upload_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_upload_succeeds_after_transient_failure() {
        let mut store = MockBlobStore::new();
        let mut seq = Sequence::new();
        store
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(AppError::Storage("503".to_string())));
        store
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let result =
            upload_with_retry(&store, ARTICLES_BLOB, Bytes::from_static(b"a"), &fast_settings(2))
                .await;
        tokio_test::assert_ok!(result);
    }

    #[tokio::test]
    async fn test_upload_gives_up_after_retries() {
        let mut store = MockBlobStore::new();
        store
            .expect_upload()
            .times(3)
            .returning(|_, _| Err(AppError::Storage("503".to_string())));

        let result =
            upload_with_retry(&store, ARTICLES_BLOB, Bytes::from_static(b"a"), &fast_settings(2))
                .await;
        match result {
            Err(AppError::Storage(msg)) => assert!(msg.contains("after 3 attempt(s)")),
            other => panic!("expected storage error, got {:?}", other),
        }
    }

    /// Transfers that never complete
    struct HangingStore;

    #[async_trait]
    impl BlobStore for HangingStore {
        async fn download(&self, _name: &str) -> AppResult<Bytes> {
            std::future::pending().await
        }

        async fn upload(&self, _name: &str, _data: Bytes) -> AppResult<()> {
            std::future::pending().await
        }

        fn describe(&self) -> String {
            "hanging".to_string()
        }
    }

    #[tokio::test]
    async fn test_stalled_download_times_out() {
        let result =
            download_with_timeout(&HangingStore, CLICKS_BLOB, Duration::from_millis(20)).await;
        match result {
            Err(AppError::Storage(msg)) => {
                assert!(msg.contains("download of clicks_sample.csv timed out"))
            }
            other => panic!("expected storage error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stalled_upload_times_out_on_every_attempt() {
        let settings = PersistenceSettings {
            timeout: Duration::from_millis(20),
            upload_retries: 1,
            upload_backoff: Duration::from_millis(1),
        };

        let result =
            upload_with_retry(&HangingStore, ARTICLES_BLOB, Bytes::from_static(b"a"), &settings)
                .await;
        match result {
            Err(AppError::Storage(msg)) => {
                assert!(msg.contains("after 2 attempt(s)"));
                assert!(msg.contains("timed out"));
            }
            other => panic!("expected storage error, got {:?}", other),
        }
    }

    #[test]
    fn test_azure_backend_requires_credentials() {
        let config = envy::from_iter::<_, Config>(vec![(
            "BLOB_ACCOUNT_NAME".to_string(),
            "acct".to_string(),
        )])
        .unwrap();
        assert!(matches!(from_config(&config), Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_download_passes_through_errors() {
        let mut store = MockBlobStore::new();
        store
            .expect_download()
            .withf(|name| name.to_string() == CLICKS_BLOB)
            .returning(|_| Err(AppError::Storage("missing".to_string())));

        let result = download_with_timeout(&store, CLICKS_BLOB, Duration::from_secs(1)).await;
        tokio_test::assert_err!(result);
    }
}
