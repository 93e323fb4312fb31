use bytes::Bytes;

use crate::domain::StorageKey;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: StorageKey,
    pub size_bytes: u64,
}

#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn put(
        &self,
        key: &StorageKey,
        data: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    async fn get(&self, key: &StorageKey) -> Result<Bytes, StorageError>;

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
