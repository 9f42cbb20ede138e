//! Graceful shutdown plumbing.
//!
//! SIGINT or SIGTERM drains the listeners within the configured budget
//! (hard stop on expiry), then shuts the worker pool down, then emits
//! the `ServerClosed` sentinel so the binary can exit zero.

use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use tokio::sync::mpsc;
use tracing::{error, info};

use blastra_core::error::AppError;
use blastra_core::traits::WorkerDispatch;

/// How often connection draining is re-checked during shutdown.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Spawn the signal listener. Whatever ends the process first — a signal
/// here or a listener error elsewhere — lands on `errors`.
pub fn spawn_signal_handler(
    handle: Handle,
    pool: Arc<dyn WorkerDispatch>,
    shutdown_timeout: Duration,
    errors: mpsc::Sender<AppError>,
) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");

        // Stop accepting and give in-flight requests the configured
        // budget; axum-server force-closes whatever remains after it.
        handle.graceful_shutdown(Some(shutdown_timeout));
        let mut waited = Duration::ZERO;
        while handle.connection_count() > 0 && waited < shutdown_timeout {
            tokio::time::sleep(DRAIN_POLL).await;
            waited += DRAIN_POLL;
        }

        pool.shutdown().await;

        let _ = errors.send(AppError::server_closed()).await;
    });
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
