//! Cache tier trait implemented by every backend.

use async_trait::async_trait;
use bytes::Bytes;

use crate::types::CacheEntry;

/// A single cache tier (in-memory, Redis, or filesystem).
///
/// Lookups must stay cheap on the hit path; backends treat their own
/// failures as misses and log them, they never surface errors to callers.
#[async_trait]
pub trait CacheBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Look up an entry. `None` counts as a miss in the tier's metrics.
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store `content` under `key`, replacing any previous entry. The
    /// backend stamps the entry with the current time and its ETag.
    async fn set(&self, key: &str, content: Bytes);

    /// Operational metrics. Every tier reports at least
    /// `type`, `size`, `hits`, and `misses`.
    async fn metrics(&self) -> serde_json::Value;
}
