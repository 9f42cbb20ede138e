//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use blastra_core::config::Configuration;

use crate::handlers::ssr::SsrContext;
use crate::health::Health;
use crate::middleware::rate_limit::IpRateLimiter;
use crate::static_index::StaticFileIndex;

/// Application state passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Validated server configuration.
    pub config: Arc<Configuration>,
    /// SSR pipeline: caches, worker pool, direct-exec fallback.
    pub ssr: Arc<SsrContext>,
    /// Preloaded static membership set, when enabled.
    pub static_index: Option<Arc<StaticFileIndex>>,
    /// Per-IP shaping limiter for the SSR path, when enabled.
    pub rate_limiter: Option<Arc<IpRateLimiter>>,
    /// Readiness flag backing `/ready`.
    pub health: Arc<Health>,
}
