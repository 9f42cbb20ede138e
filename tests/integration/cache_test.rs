//! Provider-level cache behavior across tiers.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use blastra_cache::memory::InMemoryCache;
use blastra_cache::CacheProvider;
use blastra_core::config::CacheConfig;
use blastra_core::traits::CacheBackend;
use blastra_core::types::cache::compute_etag;

fn memory_tier(max_size: usize) -> Arc<InMemoryCache> {
    InMemoryCache::ssr(CacheConfig {
        ttl: Duration::from_secs(60),
        max_size,
    })
}

#[tokio::test]
async fn round_trip_preserves_content_and_etag() {
    let provider = CacheProvider::new(Some(memory_tier(10) as Arc<dyn CacheBackend>), None);

    provider.set("k1", Bytes::from_static(b"test content")).await;

    let entry = provider.get("k1").await.expect("hit");
    assert_eq!(entry.content, Bytes::from_static(b"test content"));
    assert_eq!(entry.etag, compute_etag(b"test content"));
}

#[tokio::test]
async fn external_tier_survives_a_memory_restart() {
    let external: Arc<dyn CacheBackend> = memory_tier(10);

    let first = CacheProvider::new(
        Some(memory_tier(10) as Arc<dyn CacheBackend>),
        Some(external.clone()),
    );
    first.set("/page", Bytes::from_static(b"C")).await;

    // Fresh memory tier over the same external store, as after a restart.
    let fresh_memory = memory_tier(10);
    let second = CacheProvider::new(
        Some(fresh_memory.clone() as Arc<dyn CacheBackend>),
        Some(external),
    );

    let entry = second.get("/page").await.expect("external hit");
    assert_eq!(entry.content, Bytes::from_static(b"C"));

    // The hit backfilled the new memory tier.
    assert!(fresh_memory.get("/page").await.is_some());
}

#[tokio::test]
async fn positive_and_negative_tiers_are_distinct() {
    let positive = CacheProvider::new(Some(memory_tier(10) as Arc<dyn CacheBackend>), None);
    let negative = CacheProvider::new(
        Some(InMemoryCache::not_found(CacheConfig {
            ttl: Duration::from_secs(30),
            max_size: 10,
        }) as Arc<dyn CacheBackend>),
        None,
    );

    negative.set("/missing", Bytes::from_static(b"404 page")).await;

    assert!(negative.get("/missing").await.is_some());
    assert!(positive.get("/missing").await.is_none());
}
