use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::BlobStore;
use crate::error::{AppError, AppResult};

/// Blob store backed by a local directory, one file per blob
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, name: &str) -> AppResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(AppError::InvalidInput(format!("invalid blob name {:?}", name)));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn download(&self, name: &str) -> AppResult<Bytes> {
        let path = self.path_for(name)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::Storage(format!("failed to read {}: {}", path.display(), e)))?;
        Ok(Bytes::from(data))
    }

    async fn upload(&self, name: &str, data: Bytes) -> AppResult<()> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::Storage(format!("failed to create {}: {}", self.root.display(), e))
        })?;

        // Write beside the target and rename so readers never see a partial file
        let staging = self.root.join(format!(".{}.partial", name));
        tokio::fs::write(&staging, &data).await.map_err(|e| {
            AppError::Storage(format!("failed to write {}: {}", staging.display(), e))
        })?;
        tokio::fs::rename(&staging, &path).await.map_err(|e| {
            AppError::Storage(format!("failed to replace {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }
}
