use std::path::PathBuf;
use std::sync::Arc;

use super::ObjectStorage;
use crate::application::ports::{Storage, StorageError};
use crate::presentation::config::{StorageProvider, StorageSettings};

pub struct StorageFactory;

impl StorageFactory {
    pub fn create(settings: &StorageSettings) -> Result<Arc<dyn Storage>, StorageError> {
        match settings.provider {
            StorageProvider::Local => {
                tracing::info!(path = %settings.local_path, "Using local object storage");
                Ok(Arc::new(ObjectStorage::local(PathBuf::from(
                    &settings.local_path,
                ))?))
            }
            StorageProvider::Azure => {
                let require = |value: &Option<String>, name: &str| {
                    value.clone().ok_or_else(|| {
                        StorageError::Configuration(format!("storage.{} is required for azure", name))
                    })
                };
                let account = require(&settings.azure_account, "azure_account")?;
                let access_key = require(&settings.azure_access_key, "azure_access_key")?;
                let container = require(&settings.azure_container, "azure_container")?;
                tracing::info!(account = %account, container = %container, "Using Azure blob storage");
                Ok(Arc::new(ObjectStorage::azure(
                    &account,
                    &access_key,
                    &container,
                )?))
            }
            StorageProvider::Memory => {
                tracing::warn!("Using in-memory object storage; recordings are lost on restart");
                Ok(Arc::new(ObjectStorage::in_memory()))
            }
        }
    }
}
