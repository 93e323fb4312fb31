use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use super::OpenAiEmbedder;
use crate::application::ports::{Embedder, SharedCacheTier};
use crate::application::services::{CachedEmbedder, EmbeddingCache};
use crate::infrastructure::cache::RedisCacheTier;
use crate::presentation::config::{CacheSettings, EmbeddingsSettings};

const CACHE_NAMESPACE: &str = "callwise:embeddings";

pub struct EmbedderFactory;

impl EmbedderFactory {
    /// OpenAI-compatible embedder behind the two-tier cache. `None` when no
    /// API key is configured. An unreachable Redis leaves the cache local-only.
    pub async fn create(
        client: &Client,
        embeddings: &EmbeddingsSettings,
        cache: &CacheSettings,
    ) -> Option<Arc<dyn Embedder>> {
        if embeddings.api_key.trim().is_empty() {
            tracing::info!("Embeddings disabled: no api key configured");
            return None;
        }

        let shared: Option<Arc<dyn SharedCacheTier>> = match &cache.redis_url {
            Some(url) => match RedisCacheTier::connect(url, CACHE_NAMESPACE).await {
                Ok(tier) => Some(Arc::new(tier)),
                Err(e) => {
                    tracing::warn!(error = %e, "Redis unavailable, embedding cache is process-local");
                    None
                }
            },
            None => None,
        };

        let inner = Arc::new(OpenAiEmbedder::new(
            client.clone(),
            embeddings.base_url.clone(),
            embeddings.api_key.clone(),
            embeddings.model.clone(),
        ));
        let cache = Arc::new(EmbeddingCache::new(
            shared,
            Duration::from_secs(cache.ttl_secs),
            cache.max_local_entries,
        ));
        tracing::info!(model = %embeddings.model, "Embedder ready");
        Some(Arc::new(CachedEmbedder::new(inner, cache)))
    }
}
