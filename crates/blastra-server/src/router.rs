//! Route definitions and the main request classifier.
//!
//! `/live` and `/ready` are explicit routes; every other path falls
//! through to the classifier: static files (no rate limiting) or the SSR
//! pipeline (per-IP shaping first when enabled).

use std::net::{IpAddr, SocketAddr};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tracing::debug;

use crate::handlers::static_files;
use crate::health;
use crate::state::AppState;

/// Build the route table over the shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/live", get(health::live))
        .route("/ready", get(health::ready))
        .fallback(root_handler)
        .with_state(state)
}

async fn root_handler(State(state): State<AppState>, req: Request<Body>) -> Response {
    let path = req.uri().path().to_string();
    debug!(%path, "received request");

    let is_static = match &state.static_index {
        Some(index) => index.is_static(&path),
        None => stat_candidate(&state, &path).await,
    };

    if is_static {
        return static_files::serve(&state, req).await;
    }

    debug!(%path, "no static file found, serving SSR");

    if let Some(limiter) = &state.rate_limiter {
        let ip = client_ip(&req, state.config.trust_proxy);
        limiter.take(&ip).await;
        debug!(%ip, "rate limit token taken");
    }

    state.ssr.handle(req).await
}

/// Fallback static classification when the preload index is disabled:
/// a `stat` of the candidate path under the static root.
async fn stat_candidate(state: &AppState, url_path: &str) -> bool {
    if url_path.split('/').any(|segment| segment == "..") {
        return false;
    }
    let candidate = state
        .config
        .static_root()
        .join(url_path.trim_start_matches('/'));
    match tokio::fs::metadata(&candidate).await {
        Ok(metadata) => !metadata.is_dir(),
        Err(_) => false,
    }
}

/// Resolve the client IP for rate limiting. With `trust_proxy`, the
/// leftmost parseable `X-Forwarded-For` entry wins, then a parseable
/// `X-Real-IP`; otherwise the socket peer address.
pub fn client_ip<B>(req: &Request<B>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            if let Some(first) = forwarded.split(',').next() {
                let candidate = first.trim();
                if candidate.parse::<IpAddr>().is_ok() {
                    return candidate.to_string();
                }
            }
        }
        if let Some(real_ip) = req
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
        {
            let candidate = real_ip.trim();
            if candidate.parse::<IpAddr>().is_ok() {
                return candidate.to_string();
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}
