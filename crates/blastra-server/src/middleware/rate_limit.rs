//! Per-IP rate limiting for the SSR path.
//!
//! The limiter shapes rather than rejects: `take` suspends the request
//! until its permit time and never returns an error status. Each IP gets
//! a lazily-created leaky bucket spacing permits one interval apart;
//! waiting for a bucket serializes same-IP requests. Entries are never
//! evicted, so the map grows with the distinct-client count for the
//! lifetime of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use blastra_core::lock::mutex_lock;

#[derive(Debug)]
struct Bucket {
    next_permit: Option<Instant>,
}

/// Map of client IP to its shaping bucket.
#[derive(Debug)]
pub struct IpRateLimiter {
    buckets: StdMutex<HashMap<String, Arc<Mutex<Bucket>>>>,
    interval: Duration,
}

impl IpRateLimiter {
    /// Limiter allowing `rps` requests per second per IP (minimum one).
    pub fn new(rps: u32) -> Self {
        Self {
            buckets: StdMutex::new(HashMap::new()),
            interval: Duration::from_secs(1) / rps.max(1),
        }
    }

    fn bucket(&self, ip: &str) -> Arc<Mutex<Bucket>> {
        let mut buckets = mutex_lock(&self.buckets, "middleware::rate_limit");
        buckets
            .entry(ip.to_string())
            .or_insert_with(|| {
                debug!(ip, "created new rate limiter bucket");
                Arc::new(Mutex::new(Bucket { next_permit: None }))
            })
            .clone()
    }

    /// Take one permit for `ip`, sleeping until it is due.
    pub async fn take(&self, ip: &str) {
        let bucket = self.bucket(ip);
        let mut bucket = bucket.lock().await;

        let now = Instant::now();
        let at = match bucket.next_permit {
            Some(next) if next > now => next,
            _ => now,
        };
        bucket.next_permit = Some(at + self.interval);

        if at > now {
            tokio::time::sleep_until(at).await;
        }
    }

    /// Number of tracked client IPs.
    pub fn tracked_ips(&self) -> usize {
        mutex_lock(&self.buckets, "middleware::rate_limit").len()
    }
}
