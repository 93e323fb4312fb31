use std::sync::Arc;
use std::time::Duration;

use callwise::application::ports::SharedCacheTier;
use callwise::application::services::EmbeddingCache;
use callwise::infrastructure::cache::RedisCacheTier;
use testcontainers::core::ContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

async fn start_redis() -> (String, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("redis", "7")
        .with_exposed_port(ContainerPort::Tcp(6379))
        .start()
        .await
        .expect("Failed to start Redis container");
    let port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get Redis port");
    (format!("redis://127.0.0.1:{}", port), container)
}

async fn connect(url: &str, namespace: &str) -> RedisCacheTier {
    let mut delay = Duration::from_millis(200);
    for _ in 0..10 {
        if let Ok(tier) = RedisCacheTier::connect(url, namespace).await {
            return tier;
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(Duration::from_secs(2));
    }
    panic!("Redis did not become ready");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn given_value_set_when_reading_then_it_is_returned() {
    let (url, _container) = start_redis().await;
    let tier = connect(&url, "test").await;

    tier.set("k1", "[1.0,2.0]", Duration::from_secs(30)).await.unwrap();

    assert_eq!(tier.get("k1").await.unwrap().as_deref(), Some("[1.0,2.0]"));
    assert_eq!(tier.get("missing").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn given_two_namespaces_when_reading_then_keys_do_not_collide() {
    let (url, _container) = start_redis().await;
    let first = connect(&url, "first").await;
    let second = connect(&url, "second").await;

    first.set("shared-key", "a", Duration::from_secs(30)).await.unwrap();

    assert_eq!(second.get("shared-key").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn given_two_processes_when_one_writes_then_the_other_reads_from_redis() {
    let (url, _container) = start_redis().await;
    let writer = EmbeddingCache::new(
        Some(Arc::new(connect(&url, "emb").await)),
        Duration::from_secs(30),
        10,
    );
    let reader = EmbeddingCache::new(
        Some(Arc::new(connect(&url, "emb").await)),
        Duration::from_secs(30),
        10,
    );

    writer.set("hello   world", &[0.5, 0.25], "m").await;

    assert_eq!(reader.get("hello world", "m").await, Some(vec![0.5, 0.25]));
    assert_eq!(reader.local_len(), 0);
}
