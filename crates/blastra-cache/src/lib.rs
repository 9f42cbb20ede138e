//! # blastra-cache
//!
//! Cache tiers for rendered HTML. Three backends implement the shared
//! [`CacheBackend`](blastra_core::traits::CacheBackend) contract:
//!
//! - **memory**: in-process map with age-based eviction and periodic
//!   TTL cleanup (one flavor for SSR pages, one for 404s)
//! - **redis**: Redis-backed tier using the [redis](https://crates.io/crates/redis) crate
//! - **filesystem**: one JSON file per entry under a cache directory
//!
//! [`CacheProvider`] composes an optional memory tier with an optional
//! external tier into the read-through hierarchy the server consumes.

pub mod filesystem;
pub mod memory;
pub mod provider;
pub mod redis;

pub use provider::{create_cache_provider, new_external_cache, CacheProvider};
