//! # blastra-worker
//!
//! Lifecycle management for SSR render workers: spawning child render
//! processes with assigned ports, readiness detection on stdout, bounded
//! stderr tails, round-robin dispatch, and graceful-then-forceful
//! shutdown. External (remote) workers are supported by URL without any
//! local process management.

pub mod pool;
pub mod ports;
pub mod tail;

pub use pool::WorkerPool;
pub use ports::PortAllocator;
