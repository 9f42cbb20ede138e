//! # blastra-server
//!
//! HTTP layer for the Blastra front server built on Axum.
//!
//! Owns the request pipeline: static file classification and serving,
//! the SSR decision ladder (cache probe, worker attempt, direct-exec
//! fallback), per-IP rate limiting on the dynamic path, health probes,
//! and graceful-shutdown plumbing.

pub mod app;
pub mod handlers;
pub mod health;
pub mod httpdate;
pub mod middleware;
pub mod router;
pub mod shutdown;
pub mod state;
pub mod static_index;

pub use app::build_app;
pub use state::AppState;
