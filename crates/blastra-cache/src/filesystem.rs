//! Filesystem cache tier.
//!
//! One JSON file per entry under the configured directory, named by the
//! SHA-256 of the key. Reads take the shared lock; writes and the hourly
//! mtime-based cleanup take the exclusive lock.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, error};

use blastra_core::config::ExternalCacheConfig;
use blastra_core::result::AppResult;
use blastra_core::traits::CacheBackend;
use blastra_core::types::CacheEntry;

/// How often expired files are swept.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Filesystem-backed cache tier.
#[derive(Debug)]
pub struct FilesystemCache {
    cache_dir: PathBuf,
    ttl: Duration,
    // Serializes file access within this instance. Reads share, writes
    // and cleanup exclude.
    lock: RwLock<()>,
    hits: AtomicI64,
    misses: AtomicI64,
}

impl FilesystemCache {
    /// Create the tier, making the cache directory (mode 0755) if needed.
    pub async fn new(config: &ExternalCacheConfig) -> AppResult<Arc<Self>> {
        tokio::fs::create_dir_all(&config.cache_dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(
                &config.cache_dir,
                std::fs::Permissions::from_mode(0o755),
            )
            .await?;
        }

        let cache = Arc::new(Self {
            cache_dir: config.cache_dir.clone(),
            ttl: config.cache.ttl,
            lock: RwLock::new(()),
            hits: AtomicI64::new(0),
            misses: AtomicI64::new(0),
        });

        spawn_cleanup(Arc::downgrade(&cache));
        Ok(cache)
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(cache_file_name(key))
    }

    async fn cleanup(&self) {
        if self.ttl.is_zero() {
            return;
        }

        let _guard = self.lock.write().await;

        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(dir = %self.cache_dir.display(), error = %e, "failed to read cache directory");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if metadata.is_dir() {
                continue;
            }

            let expired = metadata
                .modified()
                .ok()
                .and_then(|mtime| mtime.elapsed().ok())
                .map(|age| age > self.ttl)
                .unwrap_or(false);

            if expired {
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    error!(path = %entry.path().display(), error = %e, "failed to remove expired cache file");
                } else {
                    debug!(path = %entry.path().display(), "removed expired cache file");
                }
            }
        }
    }

    async fn file_count(&self) -> i64 {
        let mut count = 0i64;
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(_) => return -1,
        };
        while let Ok(Some(_)) = entries.next_entry().await {
            count += 1;
        }
        count
    }
}

#[async_trait]
impl CacheBackend for FilesystemCache {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let _guard = self.lock.read().await;

        let data = match tokio::fs::read(self.file_path(key)).await {
            Ok(data) => data,
            Err(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match serde_json::from_slice::<CacheEntry>(&data) {
            Ok(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            Err(e) => {
                error!(key, error = %e, "failed to decode cached entry");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn set(&self, key: &str, content: Bytes) {
        let entry = CacheEntry::new(content);
        let data = match serde_json::to_vec(&entry) {
            Ok(data) => data,
            Err(e) => {
                error!(key, error = %e, "failed to encode cache entry");
                return;
            }
        };

        let _guard = self.lock.write().await;
        if let Err(e) = tokio::fs::write(self.file_path(key), data).await {
            error!(key, error = %e, "failed to write cache file");
        }
    }

    async fn metrics(&self) -> serde_json::Value {
        let _guard = self.lock.read().await;
        json!({
            "type": "filesystem",
            "size": self.file_count().await,
            "hits": self.hits.load(Ordering::Relaxed),
            "misses": self.misses.load(Ordering::Relaxed),
        })
    }
}

fn spawn_cleanup(cache: Weak<FilesystemCache>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(cache) = cache.upgrade() else {
                break;
            };
            cache.cleanup().await;
        }
    });
}

/// On-disk file name for a key: hashed to a safe, fixed-length name.
pub fn cache_file_name(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{}.cache", hex::encode(hasher.finalize()))
}
