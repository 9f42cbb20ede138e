//! Cache tier configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Settings shared by every cache tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheConfig {
    /// Entry time-to-live. Zero means entries are never considered stale.
    pub ttl: Duration,
    /// Maximum resident entries. Zero means "use the tier's default".
    pub max_size: usize,
}

/// Which external (second) tier to run behind the in-memory tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExternalCacheType {
    /// No external tier.
    #[default]
    None,
    /// Redis-backed tier.
    Redis,
    /// Filesystem-backed tier.
    Filesystem,
}

impl FromStr for ExternalCacheType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(Self::None),
            "redis" => Ok(Self::Redis),
            "filesystem" => Ok(Self::Filesystem),
            other => Err(AppError::configuration(format!(
                "invalid external cache type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ExternalCacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Redis => write!(f, "redis"),
            Self::Filesystem => write!(f, "filesystem"),
        }
    }
}

/// Settings for the external cache tier.
#[derive(Debug, Clone, Default)]
pub struct ExternalCacheConfig {
    /// TTL and size cap applied to the tier.
    pub cache: CacheConfig,
    /// Selected backend.
    pub kind: ExternalCacheType,
    /// Redis address, either `host:port` or a full `redis://` URL.
    pub redis_url: String,
    /// Redis password, if required.
    pub redis_password: String,
    /// Redis logical database index.
    pub redis_db: i64,
    /// Directory for the filesystem tier.
    pub cache_dir: PathBuf,
}
