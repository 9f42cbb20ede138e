//! Liveness and readiness probes.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, info};

use crate::state::AppState;

/// Process readiness flag. Liveness needs no state: answering at all is
/// the signal.
#[derive(Debug, Default)]
pub struct Health {
    ready: AtomicBool,
}

impl Health {
    pub fn new() -> Self {
        debug!("initializing health checker");
        Self::default()
    }

    /// Flip `/ready` to 200. Called once the listener accepts connections.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
        info!("service marked as ready");
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

/// GET /live
pub async fn live() -> &'static str {
    "OK"
}

/// GET /ready
pub async fn ready(State(state): State<AppState>) -> Response {
    if state.health.is_ready() {
        (StatusCode::OK, "Ready").into_response()
    } else {
        debug!("service not ready yet");
        (StatusCode::SERVICE_UNAVAILABLE, "Not Ready").into_response()
    }
}
