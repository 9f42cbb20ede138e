//! Bounded ring buffer for worker stderr lines.

use std::sync::Mutex;

use blastra_core::lock::mutex_lock;

#[derive(Debug)]
struct TailState {
    lines: Vec<String>,
    next: usize,
    full: bool,
}

/// Keeps the last N stderr lines of a worker for exit diagnostics.
#[derive(Debug)]
pub struct StderrTail {
    state: Mutex<TailState>,
}

impl StderrTail {
    /// Ring buffer holding up to `capacity` lines (minimum one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(TailState {
                lines: vec![String::new(); capacity],
                next: 0,
                full: false,
            }),
        }
    }

    /// Append a line, overwriting the oldest when full.
    pub fn push(&self, line: String) {
        let mut state = mutex_lock(&self.state, "worker::tail");
        let capacity = state.lines.len();
        let next = state.next;
        state.lines[next] = line;
        state.next = (next + 1) % capacity;
        if !state.full && state.next == 0 {
            state.full = true;
        }
    }

    /// The retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        let state = mutex_lock(&self.state, "worker::tail");
        if !state.full {
            return state.lines[..state.next].to_vec();
        }
        let mut out = Vec::with_capacity(state.lines.len());
        out.extend_from_slice(&state.lines[state.next..]);
        out.extend_from_slice(&state.lines[..state.next]);
        out
    }
}
