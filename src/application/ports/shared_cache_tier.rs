use std::time::Duration;

use async_trait::async_trait;

/// A cache shared between processes, addressed by string keys.
#[async_trait]
pub trait SharedCacheTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache command failed: {0}")]
    CommandFailed(String),
}
