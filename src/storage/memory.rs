use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::BlobStore;
use crate::error::{AppError, AppResult};

/// Process-local blob store. Used by tests and for seeding fixtures.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Bytes>>,
    fail_uploads: AtomicBool,
    uploads: AtomicUsize,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a blob directly, bypassing failure injection
    pub async fn insert(&self, name: &str, data: impl Into<Bytes>) {
        self.blobs.write().await.insert(name.to_string(), data.into());
    }

    pub async fn get(&self, name: &str) -> Option<Bytes> {
        self.blobs.read().await.get(name).cloned()
    }

    /// Makes every subsequent upload fail until switched back
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful uploads so far
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn download(&self, name: &str) -> AppResult<Bytes> {
        self.get(name)
            .await
            .ok_or_else(|| AppError::Storage(format!("blob {} does not exist", name)))
    }

    async fn upload(&self, name: &str, data: Bytes) -> AppResult<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(AppError::Storage(format!("upload of {} rejected", name)));
        }
        self.insert(name, data).await;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failure_injection() {
        let store = InMemoryBlobStore::new();
        store.set_fail_uploads(true);
        assert!(store.upload("a", Bytes::from_static(b"1")).await.is_err());
        assert_eq!(store.upload_count(), 0);

        store.set_fail_uploads(false);
        store.upload("a", Bytes::from_static(b"1")).await.unwrap();
        assert_eq!(store.upload_count(), 1);
        assert_eq!(store.download("a").await.unwrap(), Bytes::from_static(b"1"));
    }
}
