//! Render worker pool configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Everything the worker pool needs to spawn and supervise render workers.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of local workers to spawn. Zero disables the pool.
    pub count: usize,
    /// Working directory for the worker processes.
    pub cwd: PathBuf,
    /// Worker executable.
    pub command: String,
    /// Worker arguments.
    pub args: Vec<String>,
    /// External worker URLs. When non-empty, no local workers are spawned.
    pub external_urls: Vec<String>,
    /// Forward worker stdout/stderr lines to the server log.
    pub stream_stdio: bool,
    /// Capacity of the per-worker stderr tail ring buffer.
    pub stderr_tail_lines: usize,
    /// Substring a worker prints on stdout once its listener is up.
    pub ready_pattern: String,
    /// How long to wait for the readiness token before proceeding anyway.
    pub ready_timeout: Duration,
    /// Extra fragment appended to the worker's `NODE_OPTIONS`.
    pub node_options_extra: String,
    /// Value for the worker's `DEBUG` variable, if any.
    pub debug_env: String,
    /// Set `FORCE_COLOR=1` in the worker environment.
    pub force_color: bool,
}
