use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use callwise::application::ports::{Embedder, SharedCacheTier};
use callwise::application::services::{CachedEmbedder, EmbeddingCache, cache_key};
use crate::helpers::{CountingEmbedder, MapCacheTier};

const MODEL: &str = "text-embedding-3-small";

fn with_shared(tier: Arc<MapCacheTier>) -> EmbeddingCache {
    let shared: Arc<dyn SharedCacheTier> = tier;
    EmbeddingCache::new(Some(shared), Duration::from_secs(300), 100)
}

#[test]
fn given_texts_differing_only_in_whitespace_when_keyed_then_keys_match() {
    assert_eq!(
        cache_key("  pricing   objection\n", MODEL),
        cache_key("pricing objection", MODEL)
    );
}

#[test]
fn given_same_text_under_different_models_when_keyed_then_keys_differ() {
    assert_ne!(cache_key("hello", "model-a"), cache_key("hello", "model-b"));
    assert_eq!(cache_key("hello", MODEL).len(), 64);
}

#[tokio::test]
async fn given_local_only_cache_when_value_set_then_get_returns_it() {
    let cache = EmbeddingCache::local_only();

    cache.set("hello world", &[0.5, 0.25], MODEL).await;

    assert_eq!(cache.get("hello   world", MODEL).await, Some(vec![0.5, 0.25]));
    assert_eq!(cache.get("hello world", "other-model").await, None);
}

#[tokio::test]
async fn given_shared_tier_when_value_set_then_both_tiers_hold_it() {
    let tier = Arc::new(MapCacheTier::default());
    let cache = with_shared(tier.clone());

    cache.set("hello", &[1.0, 2.0], MODEL).await;

    assert_eq!(cache.local_len(), 1);
    let raw = tier.values.lock().get(&cache_key("hello", MODEL)).cloned();
    assert_eq!(raw.as_deref(), Some("[1.0,2.0]"));
}

#[tokio::test]
async fn given_shared_tier_misses_when_local_has_value_then_shared_answer_wins() {
    let tier = Arc::new(MapCacheTier::default());
    let cache = with_shared(tier.clone());
    cache.set("hello", &[1.0], MODEL).await;
    tier.values.lock().clear();

    assert_eq!(cache.get("hello", MODEL).await, None);
}

#[tokio::test]
async fn given_shared_tier_errors_when_reading_then_local_tier_answers() {
    let tier = Arc::new(MapCacheTier::failing());
    let cache = with_shared(tier.clone());

    cache.set("hello", &[3.0], MODEL).await;

    assert_eq!(cache.get("hello", MODEL).await, Some(vec![3.0]));
    assert_eq!(tier.gets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn given_undecodable_shared_value_when_reading_then_treated_as_miss() {
    let tier = Arc::new(MapCacheTier::default());
    tier.values
        .lock()
        .insert(cache_key("hello", MODEL), "not-a-vector".to_string());
    let cache = with_shared(tier);

    assert_eq!(cache.get("hello", MODEL).await, None);
}

#[tokio::test(start_paused = true)]
async fn given_local_entry_past_ttl_when_reading_then_it_is_gone() {
    let cache = EmbeddingCache::new(None, Duration::from_secs(10), 100);
    cache.set("hello", &[1.0], MODEL).await;

    tokio::time::advance(Duration::from_secs(11)).await;

    assert_eq!(cache.get("hello", MODEL).await, None);
    assert_eq!(cache.local_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn given_local_tier_over_capacity_when_setting_then_expired_entries_are_pruned() {
    let cache = EmbeddingCache::new(None, Duration::from_secs(10), 2);
    cache.set("one", &[1.0], MODEL).await;
    cache.set("two", &[2.0], MODEL).await;

    tokio::time::advance(Duration::from_secs(11)).await;
    cache.set("three", &[3.0], MODEL).await;

    assert_eq!(cache.local_len(), 1);
    assert_eq!(cache.get("three", MODEL).await, Some(vec![3.0]));
}

#[tokio::test]
async fn given_cached_embedder_when_batch_contains_hits_then_only_misses_reach_inner() {
    let inner = Arc::new(CountingEmbedder::default());
    let cache = Arc::new(EmbeddingCache::local_only());
    let embedder = CachedEmbedder::new(inner.clone(), Arc::clone(&cache));

    let first = embedder.embed("pricing").await.expect("embedding");
    let batch = embedder
        .embed_batch(&["pricing", "discovery", "closing"])
        .await
        .expect("batch embedding");

    assert_eq!(inner.embedded.load(Ordering::SeqCst), 3);
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[0], first);
    assert_eq!(batch[1].values, vec![9.0, 1.0]);
    assert_eq!(embedder.model(), "test-embedding");
}
