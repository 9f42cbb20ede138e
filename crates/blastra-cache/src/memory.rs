//! In-memory cache tier.
//!
//! A plain map guarded by a read-write lock. Capacity is enforced at
//! insert time by evicting the entry with the oldest write stamp. TTL is
//! enforced only by the periodic cleanup task, so an expired entry that
//! is still resident will be served as a hit until the next sweep.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use blastra_core::config::CacheConfig;
use blastra_core::lock::{rw_read, rw_write};
use blastra_core::traits::CacheBackend;
use blastra_core::types::CacheEntry;

/// Default entry cap for the SSR flavor.
const DEFAULT_SSR_MAX_SIZE: usize = 1000;
/// Default entry cap for the 404 flavor.
const DEFAULT_NOT_FOUND_MAX_SIZE: usize = 250;
/// How often the cleanup task sweeps expired entries.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// In-memory cache tier. Construct with [`InMemoryCache::ssr`] or
/// [`InMemoryCache::not_found`]; both share the same logic and differ
/// only in their default size and log labels.
#[derive(Debug)]
pub struct InMemoryCache {
    data: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_size: usize,
    label: &'static str,
    hits: AtomicI64,
    misses: AtomicI64,
    cleanups: AtomicI64,
}

impl InMemoryCache {
    /// Memory tier for rendered pages. A zero size cap selects the
    /// default of 1000 entries.
    pub fn ssr(config: CacheConfig) -> Arc<Self> {
        Self::with_defaults(config, DEFAULT_SSR_MAX_SIZE, "ssr")
    }

    /// Memory tier for negative (404) responses. A zero size cap selects
    /// the default of 250 entries.
    pub fn not_found(config: CacheConfig) -> Arc<Self> {
        Self::with_defaults(config, DEFAULT_NOT_FOUND_MAX_SIZE, "404")
    }

    fn with_defaults(config: CacheConfig, default_size: usize, label: &'static str) -> Arc<Self> {
        let max_size = if config.max_size == 0 {
            default_size
        } else {
            config.max_size
        };

        let cache = Arc::new(Self {
            data: RwLock::new(HashMap::with_capacity(max_size)),
            ttl: config.ttl,
            max_size,
            label,
            hits: AtomicI64::new(0),
            misses: AtomicI64::new(0),
            cleanups: AtomicI64::new(0),
        });

        spawn_cleanup(Arc::downgrade(&cache));
        cache
    }

    fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let entry = rw_read(&self.data, "cache::memory").get(key).cloned();

        match entry {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.label, key, "cache hit");
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache = self.label, key, "cache miss");
                None
            }
        }
    }

    fn insert(&self, key: &str, content: Bytes) {
        let mut data = rw_write(&self.data, "cache::memory");

        // At capacity: drop the entry with the oldest write stamp.
        if data.len() >= self.max_size {
            if let Some(oldest) = data
                .iter()
                .min_by_key(|(_, entry)| entry.last_updated)
                .map(|(key, _)| key.clone())
            {
                data.remove(&oldest);
                debug!(cache = self.label, key = %oldest, "evicted oldest cache entry");
            }
        }

        data.insert(key.to_string(), CacheEntry::new(content));
        debug!(cache = self.label, key, "cache entry set");
    }

    fn is_empty(&self) -> bool {
        rw_read(&self.data, "cache::memory").is_empty()
    }

    fn cleanup(&self) {
        if self.ttl.is_zero() {
            return;
        }

        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return;
        };

        let mut data = rw_write(&self.data, "cache::memory");
        let before = data.len();
        let now = Utc::now();

        data.retain(|_, entry| now - entry.last_updated <= ttl);

        let removed = before - data.len();
        if removed > 0 {
            self.cleanups.fetch_add(1, Ordering::Relaxed);
            debug!(cache = self.label, removed, "cache cleanup removed expired entries");
        }
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.lookup(key)
    }

    async fn set(&self, key: &str, content: Bytes) {
        self.insert(key, content);
    }

    async fn metrics(&self) -> serde_json::Value {
        let size = rw_read(&self.data, "cache::memory").len();
        json!({
            "type": "memory",
            "size": size,
            "maxSize": self.max_size,
            "hits": self.hits.load(Ordering::Relaxed),
            "misses": self.misses.load(Ordering::Relaxed),
            "cleanups": self.cleanups.load(Ordering::Relaxed),
            "ttl": humantime::format_duration(self.ttl).to_string(),
        })
    }
}

fn spawn_cleanup(cache: Weak<InMemoryCache>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(cache) = cache.upgrade() else {
                break;
            };
            if !cache.is_empty() {
                cache.cleanup();
            }
        }
    });
}
