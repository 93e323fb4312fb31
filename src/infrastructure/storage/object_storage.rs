use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};

use crate::application::ports::{Storage, StorageError, StoredObject};
use crate::domain::StorageKey;

/// `Storage` over any `object_store` backend.
pub struct ObjectStorage {
    inner: Arc<dyn ObjectStore>,
    /// Whether the backend accepts object attributes such as content type.
    attributes: bool,
}

impl ObjectStorage {
    pub fn local(base_path: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&base_path)?;
        let fs = LocalFileSystem::new_with_prefix(base_path)
            .map_err(|e| StorageError::Configuration(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(fs),
            attributes: false,
        })
    }

    pub fn azure(account: &str, access_key: &str, container: &str) -> Result<Self, StorageError> {
        let store = MicrosoftAzureBuilder::new()
            .with_account(account)
            .with_access_key(access_key)
            .with_container_name(container)
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(store),
            attributes: true,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
            attributes: false,
        }
    }
}

#[async_trait::async_trait]
impl Storage for ObjectStorage {
    async fn put(
        &self,
        key: &StorageKey,
        data: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let path = StorePath::from(key.as_str());
        let size_bytes = data.len() as u64;

        let mut options = PutOptions::default();
        if self.attributes {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            options.attributes = attributes;
        }

        self.inner
            .put_opts(&path, PutPayload::from(data), options)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::debug!(key = %key, bytes = size_bytes, "Stored object");
        Ok(StoredObject {
            key: key.clone(),
            size_bytes,
        })
    }

    async fn get(&self, key: &StorageKey) -> Result<Bytes, StorageError> {
        let path = StorePath::from(key.as_str());
        let result = self.inner.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        let path = StorePath::from(key.as_str());
        self.inner
            .delete(&path)
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))
    }
}
