//! Application builder and listeners.
//!
//! Wires router + middleware into the final Axum app and runs the HTTP
//! (and optional TLS) listeners through `axum-server` so both share one
//! graceful-shutdown handle.

use std::net::SocketAddr;

use axum::{middleware as axum_middleware, Router};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use blastra_core::error::{AppError, ErrorKind};
use blastra_core::result::AppResult;

use crate::middleware;
use crate::router::build_router;
use crate::state::AppState;

/// Build the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let gzip_enabled = state.config.gzip_enabled;

    let router = build_router(state)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging));

    let router = if gzip_enabled {
        router.layer(CompressionLayer::new())
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}

/// Run the plain HTTP listener until shutdown.
pub async fn serve_http(port: u16, app: Router, handle: Handle) -> AppResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "starting HTTP server");
    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(AppError::from)
}

/// Run the TLS listener from the configured PEM pair until shutdown.
pub async fn serve_https(
    port: u16,
    cert_path: &str,
    key_path: &str,
    app: Router,
    handle: Handle,
) -> AppResult<()> {
    let tls = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, "failed to load TLS certificate", e)
        })?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "starting HTTPS server");
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(AppError::from)
}
