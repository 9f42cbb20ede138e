//! Worker port allocation.
//!
//! The host's port space is a single physical resource, so the binary
//! shares one allocator across every pool it starts; tests construct
//! their own. `last_used` only ever advances: a pool restart gets fresh
//! ports even after its predecessor released everything, which keeps a
//! new worker off a port whose previous socket may linger in TIME_WAIT.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use blastra_core::lock::mutex_lock;

/// First port handed to workers by the shared allocator.
pub const BASE_PORT: u16 = 5174;

static SHARED: Lazy<Arc<PortAllocator>> = Lazy::new(|| Arc::new(PortAllocator::new(BASE_PORT)));

#[derive(Debug)]
struct PortState {
    used: HashSet<u16>,
    last_used: u16,
}

/// Monotonic port allocator for worker processes.
#[derive(Debug)]
pub struct PortAllocator {
    state: Mutex<PortState>,
}

impl PortAllocator {
    /// Allocator starting at `base_port`.
    pub fn new(base_port: u16) -> Self {
        Self {
            state: Mutex::new(PortState {
                used: HashSet::new(),
                last_used: base_port - 1,
            }),
        }
    }

    /// The process-wide allocator used by the server binary.
    pub fn shared() -> Arc<Self> {
        SHARED.clone()
    }

    /// Claim the next free port past `last_used`.
    pub fn next(&self) -> u16 {
        let mut state = mutex_lock(&self.state, "worker::ports");
        let mut port = state.last_used + 1;
        while state.used.contains(&port) {
            port += 1;
        }
        state.used.insert(port);
        state.last_used = port;
        port
    }

    /// Return a port to the free set. `last_used` is not rolled back.
    pub fn release(&self, port: u16) {
        mutex_lock(&self.state, "worker::ports").used.remove(&port);
    }

    /// Release every held port, keeping `last_used` so later allocations
    /// stay fresh.
    pub fn release_all(&self) {
        mutex_lock(&self.state, "worker::ports").used.clear();
    }
}
