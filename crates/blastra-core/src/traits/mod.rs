//! Traits shared across the Blastra crates.

pub mod cache;
pub mod worker;

pub use cache::CacheBackend;
pub use worker::WorkerDispatch;
