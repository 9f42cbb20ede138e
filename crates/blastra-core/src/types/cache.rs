//! The universal cached artifact shared by every cache tier.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single cached response body with its validation metadata.
///
/// Entries are immutable once written under a given key until replaced.
/// The serialized form (used by the Redis and filesystem tiers) keeps the
/// wire-compatible field names: `Content` as base64, `LastUpdated` as
/// RFC 3339, `ETag` as the quoted hex digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The response body.
    #[serde(rename = "Content", with = "base64_bytes")]
    pub content: Bytes,
    /// When the entry was written. Drives TTL expiry and `Last-Modified`.
    #[serde(rename = "LastUpdated")]
    pub last_updated: DateTime<Utc>,
    /// Quoted lowercase hex SHA-256 of `content`.
    #[serde(rename = "ETag")]
    pub etag: String,
}

impl CacheEntry {
    /// Build an entry for `content` stamped with the current time.
    pub fn new(content: Bytes) -> Self {
        let etag = compute_etag(&content);
        Self {
            content,
            last_updated: Utc::now(),
            etag,
        }
    }
}

/// Compute the quoted entity tag for a response body.
///
/// Two bodies with equal content always yield equal tags.
pub fn compute_etag(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("\"{}\"", hex::encode(hasher.finalize()))
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
