use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::application::ports::{CacheError, SharedCacheTier};

/// Shared cache tier backed by Redis through a reconnecting connection manager.
#[derive(Clone)]
pub struct RedisCacheTier {
    connection: ConnectionManager,
    namespace: String,
}

impl RedisCacheTier {
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        tracing::info!("Connected to Redis cache");
        Ok(Self {
            connection,
            namespace: namespace.into(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl SharedCacheTier for RedisCacheTier {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        connection
            .get(self.namespaced(key))
            .await
            .map_err(|e| CacheError::CommandFailed(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(self.namespaced(key), value, ttl.as_secs().max(1))
            .await
            .map_err(|e| CacheError::CommandFailed(e.to_string()))
    }
}
