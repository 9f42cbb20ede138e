//! Two-tier cache composition.
//!
//! `Get` consults the memory tier first, then the external tier; an
//! external hit is written back up into memory. `Set` writes both tiers.
//! There is no cross-tier atomicity: concurrent writers settle on
//! latest-wins.

use std::sync::Arc;

use bytes::Bytes;
use tracing::info;

use blastra_core::config::{ExternalCacheConfig, ExternalCacheType};
use blastra_core::result::AppResult;
use blastra_core::traits::CacheBackend;
use blastra_core::types::CacheEntry;

use crate::filesystem::FilesystemCache;
use crate::redis::RedisCache;

/// The cache hierarchy consumed by the request pipeline. Either tier may
/// be absent; an empty provider misses everything and drops writes.
#[derive(Debug, Clone, Default)]
pub struct CacheProvider {
    memory: Option<Arc<dyn CacheBackend>>,
    external: Option<Arc<dyn CacheBackend>>,
}

impl CacheProvider {
    pub fn new(
        memory: Option<Arc<dyn CacheBackend>>,
        external: Option<Arc<dyn CacheBackend>>,
    ) -> Self {
        Self { memory, external }
    }

    /// Read through the hierarchy, backfilling memory on an external hit.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        if let Some(memory) = &self.memory {
            if let Some(entry) = memory.get(key).await {
                return Some(entry);
            }
        }

        if let Some(external) = &self.external {
            if let Some(entry) = external.get(key).await {
                if let Some(memory) = &self.memory {
                    memory.set(key, entry.content.clone()).await;
                }
                return Some(entry);
            }
        }

        None
    }

    /// Store in every available tier.
    pub async fn set(&self, key: &str, content: Bytes) {
        if let Some(memory) = &self.memory {
            memory.set(key, content.clone()).await;
        }
        if let Some(external) = &self.external {
            external.set(key, content).await;
        }
    }

    /// Combined metrics from all tiers.
    pub async fn metrics(&self) -> serde_json::Value {
        let mut combined = serde_json::Map::new();
        if let Some(memory) = &self.memory {
            combined.insert("memory".to_string(), memory.metrics().await);
        }
        if let Some(external) = &self.external {
            combined.insert("external".to_string(), external.metrics().await);
        }
        serde_json::Value::Object(combined)
    }
}

/// Build the external tier selected by configuration, or `None`.
pub async fn new_external_cache(
    config: &ExternalCacheConfig,
) -> AppResult<Option<Arc<dyn CacheBackend>>> {
    match config.kind {
        ExternalCacheType::None => Ok(None),
        ExternalCacheType::Redis => {
            let cache = RedisCache::connect(config).await?;
            Ok(Some(Arc::new(cache)))
        }
        ExternalCacheType::Filesystem => {
            let cache = FilesystemCache::new(config).await?;
            Ok(Some(cache as Arc<dyn CacheBackend>))
        }
    }
}

/// Compose a provider from a memory tier and the configured external tier.
pub async fn create_cache_provider(
    memory: Option<Arc<dyn CacheBackend>>,
    external_config: &ExternalCacheConfig,
) -> AppResult<CacheProvider> {
    let external = new_external_cache(external_config).await?;
    if external.is_some() {
        info!(kind = %external_config.kind, "external cache tier enabled");
    }
    Ok(CacheProvider::new(memory, external))
}
