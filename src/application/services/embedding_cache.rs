use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use crate::application::ports::{Embedder, EmbedderError, SharedCacheTier};
use crate::domain::Embedding;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_LOCAL_ENTRIES: usize = 1_000;

/// Content-addressed key: hex SHA-256 over `model`, a NUL separator and the
/// whitespace-normalized text.
pub fn cache_key(text: &str, model: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

struct LocalEntry {
    vector: Vec<f32>,
    expires_at: Instant,
}

/// Two-tier embedding cache.
///
/// The shared tier is authoritative when it answers. The local tier is read
/// only when there is no shared tier or the shared tier errors, and every
/// write lands in both.
pub struct EmbeddingCache {
    shared: Option<Arc<dyn SharedCacheTier>>,
    local: DashMap<String, LocalEntry>,
    ttl: Duration,
    max_local_entries: usize,
}

impl EmbeddingCache {
    pub fn new(
        shared: Option<Arc<dyn SharedCacheTier>>,
        ttl: Duration,
        max_local_entries: usize,
    ) -> Self {
        Self {
            shared,
            local: DashMap::new(),
            ttl,
            max_local_entries: max_local_entries.max(1),
        }
    }

    pub fn local_only() -> Self {
        Self::new(None, DEFAULT_CACHE_TTL, DEFAULT_MAX_LOCAL_ENTRIES)
    }

    pub async fn get(&self, text: &str, model: &str) -> Option<Vec<f32>> {
        let key = cache_key(text, model);

        if let Some(shared) = &self.shared {
            match shared.get(&key).await {
                Ok(Some(raw)) => match serde_json::from_str::<Vec<f32>>(&raw) {
                    Ok(vector) => return Some(vector),
                    Err(e) => {
                        tracing::warn!(error = %e, "Discarding undecodable shared cache entry");
                        return None;
                    }
                },
                Ok(None) => return None,
                Err(e) => {
                    tracing::debug!(error = %e, "Shared embedding cache unavailable, reading local tier");
                }
            }
        }

        self.get_local(&key)
    }

    pub async fn set(&self, text: &str, vector: &[f32], model: &str) {
        let key = cache_key(text, model);

        if let Some(shared) = &self.shared {
            match serde_json::to_string(vector) {
                Ok(raw) => {
                    if let Err(e) = shared.set(&key, &raw, self.ttl).await {
                        tracing::debug!(error = %e, "Shared embedding cache write failed");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to encode embedding for cache"),
            }
        }

        self.local.insert(
            key,
            LocalEntry {
                vector: vector.to_vec(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        if self.local.len() > self.max_local_entries {
            self.evict_expired();
        }
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    fn get_local(&self, key: &str) -> Option<Vec<f32>> {
        let now = Instant::now();
        let lookup = self
            .local
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.vector.clone()));

        match lookup {
            Some(Some(vector)) => Some(vector),
            Some(None) => {
                self.local.remove(key);
                None
            }
            None => None,
        }
    }

    fn evict_expired(&self) {
        let now = Instant::now();
        let before = self.local.len();
        self.local.retain(|_, entry| entry.expires_at > now);
        tracing::debug!(
            evicted = before.saturating_sub(self.local.len()),
            remaining = self.local.len(),
            "Pruned local embedding cache"
        );
    }
}

/// `Embedder` decorator that serves repeated texts from an `EmbeddingCache`.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Arc<EmbeddingCache>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, cache: Arc<EmbeddingCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbedderError> {
        let model = self.inner.model();
        if let Some(vector) = self.cache.get(text, model).await {
            return Ok(Embedding::new(vector));
        }

        let embedding = self.inner.embed(text).await?;
        self.cache.set(text, &embedding.values, model).await;
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedderError> {
        let model = self.inner.model();
        let mut results: Vec<Option<Embedding>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<usize> = Vec::new();

        for (index, text) in texts.iter().enumerate() {
            match self.cache.get(text, model).await {
                Some(vector) => results.push(Some(Embedding::new(vector))),
                None => {
                    results.push(None);
                    misses.push(index);
                }
            }
        }

        if !misses.is_empty() {
            let miss_texts: Vec<&str> = misses.iter().map(|&i| texts[i]).collect();
            let embedded = self.inner.embed_batch(&miss_texts).await?;
            if embedded.len() != miss_texts.len() {
                return Err(EmbedderError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    miss_texts.len(),
                    embedded.len()
                )));
            }
            for (index, embedding) in misses.into_iter().zip(embedded) {
                self.cache.set(texts[index], &embedding.values, model).await;
                results[index] = Some(embedding);
            }
        }

        results
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| EmbedderError::InvalidResponse("missing embedding".to_string()))
            })
            .collect()
    }
}
