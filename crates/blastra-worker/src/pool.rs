//! The render worker pool.
//!
//! Local mode spawns one child process per worker with an assigned port,
//! captures both stdio streams, waits (advisorily) for a readiness token
//! on stdout, and supervises each child with a reaper task. External mode
//! wraps a list of remote worker URLs with no process management at all.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use blastra_core::config::WorkerPoolConfig;
use blastra_core::error::{AppError, ErrorKind};
use blastra_core::lock::{rw_read, rw_write};
use blastra_core::result::AppResult;
use blastra_core::traits::WorkerDispatch;

use crate::ports::PortAllocator;
use crate::tail::StderrTail;

/// Pause between worker spawns to stagger cold starts.
const SPAWN_STAGGER: Duration = Duration::from_millis(100);
/// How long shutdown waits for reapers before escalating.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
/// Gap between SIGINT and SIGKILL during escalation.
const KILL_GRACE: Duration = Duration::from_millis(100);

/// One supervised worker. `port` is zero and `pid` absent for external
/// workers.
#[derive(Debug, Clone)]
struct WorkerHandle {
    port: u16,
    endpoint: String,
    pid: Option<i32>,
}

/// Pool of SSR render workers.
#[derive(Debug)]
pub struct WorkerPool {
    workers: RwLock<Vec<WorkerHandle>>,
    counter: AtomicU64,
    enabled: bool,
    cancel: Option<CancellationToken>,
    reapers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    ports: Arc<PortAllocator>,
}

impl WorkerPool {
    /// A pool that dispatches nothing. Used when no workers are
    /// configured or the pool failed to start.
    pub fn disabled() -> Self {
        Self {
            workers: RwLock::new(Vec::new()),
            counter: AtomicU64::new(0),
            enabled: false,
            cancel: None,
            reapers: tokio::sync::Mutex::new(Vec::new()),
            ports: PortAllocator::shared(),
        }
    }

    /// Start the pool described by `config`, drawing ports from `ports`.
    ///
    /// With external URLs configured no processes are spawned. A worker
    /// count of zero yields a disabled pool. Any spawn failure tears the
    /// partial pool down and is returned to the caller, who may fall back
    /// to direct-exec rendering with a disabled pool.
    pub async fn start(config: &WorkerPoolConfig, ports: Arc<PortAllocator>) -> AppResult<Self> {
        if !config.external_urls.is_empty() {
            debug!(urls = ?config.external_urls, "using external worker URLs");
            let workers = config
                .external_urls
                .iter()
                .map(|url| WorkerHandle {
                    port: 0,
                    endpoint: url.clone(),
                    pid: None,
                })
                .collect();
            return Ok(Self {
                workers: RwLock::new(workers),
                counter: AtomicU64::new(0),
                enabled: true,
                cancel: None,
                reapers: tokio::sync::Mutex::new(Vec::new()),
                ports,
            });
        }

        if config.count == 0 {
            debug!("worker pool disabled (no workers configured)");
            return Ok(Self::disabled());
        }

        // Clean slate before spawning; last_used keeps advancing so a
        // restarted pool lands on fresh ports.
        ports.release_all();

        debug!(count = config.count, "starting worker pool");
        let cancel = CancellationToken::new();
        let mut workers = Vec::with_capacity(config.count);
        let mut reapers = Vec::with_capacity(config.count);

        for _ in 0..config.count {
            let port = ports.next();
            match spawn_worker(config, port, &cancel, &ports).await {
                Ok((handle, reaper)) => {
                    workers.push(handle);
                    reapers.push(reaper);
                }
                Err(e) => {
                    cancel.cancel();
                    ports.release_all();
                    return Err(e);
                }
            }
            tokio::time::sleep(SPAWN_STAGGER).await;
        }

        debug!("all workers started");
        Ok(Self {
            workers: RwLock::new(workers),
            counter: AtomicU64::new(0),
            enabled: true,
            cancel: Some(cancel),
            reapers: tokio::sync::Mutex::new(reapers),
            ports,
        })
    }
}

#[async_trait]
impl WorkerDispatch for WorkerPool {
    fn worker_endpoint(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let workers = rw_read(&self.workers, "worker::pool");
        if workers.is_empty() {
            debug!("no available workers in pool");
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let endpoint = workers[idx as usize % workers.len()].endpoint.clone();
        debug!(%endpoint, "dispatching request to worker");
        Some(endpoint)
    }

    async fn shutdown(&self) {
        if !self.enabled {
            return;
        }
        let Some(cancel) = &self.cancel else {
            debug!("external worker pool shutdown, no local workers to stop");
            return;
        };

        debug!("shutting down worker pool");
        cancel.cancel();

        let handles: Vec<JoinHandle<()>> = self.reapers.lock().await.drain(..).collect();
        let mut all = futures::future::join_all(handles);

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut all).await {
            Ok(_) => debug!("all workers shut down"),
            Err(_) => {
                warn!("worker shutdown timed out, forcefully terminating");
                let survivors: Vec<WorkerHandle> =
                    rw_read(&self.workers, "worker::pool").clone();
                for worker in &survivors {
                    if let Some(pid) = worker.pid {
                        send_signal(pid, libc::SIGINT);
                    }
                }
                tokio::time::sleep(KILL_GRACE).await;
                for worker in &survivors {
                    if let Some(pid) = worker.pid {
                        send_signal(pid, libc::SIGKILL);
                    }
                    if worker.port > 0 {
                        self.ports.release(worker.port);
                    }
                }
                // Reapers must terminate once their children are gone.
                all.await;
            }
        }

        rw_write(&self.workers, "worker::pool").clear();
    }
}

async fn spawn_worker(
    config: &WorkerPoolConfig,
    port: u16,
    cancel: &CancellationToken,
    ports: &Arc<PortAllocator>,
) -> AppResult<(WorkerHandle, JoinHandle<()>)> {
    debug!(port, "starting worker");

    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args)
        .current_dir(&config.cwd)
        .env("PORT", port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if config.force_color {
        cmd.env("FORCE_COLOR", "1");
    }
    let node_options = combined_node_options(&config.node_options_extra);
    if !node_options.is_empty() {
        cmd.env("NODE_OPTIONS", node_options);
    }
    if !config.debug_env.is_empty() {
        cmd.env("DEBUG", &config.debug_env);
    }

    let started_at = Instant::now();
    let mut child = cmd.spawn().map_err(|e| {
        error!(port, error = %e, "failed to start worker");
        AppError::with_source(
            ErrorKind::Worker,
            format!("failed to start worker on port {port}"),
            e,
        )
    })?;
    let pid = child.id();

    info!(
        port,
        pid,
        cmd = %config.command,
        args = %config.args.join(" "),
        cwd = %config.cwd.display(),
        "worker started"
    );

    let tail = Arc::new(StderrTail::new(config.stderr_tail_lines));

    let (ready_tx, ready_rx) = oneshot::channel();
    if let Some(stdout) = child.stdout.take() {
        spawn_stdout_reader(
            stdout,
            port,
            pid,
            config.ready_pattern.clone(),
            config.stream_stdio,
            ready_tx,
        );
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_stderr_reader(stderr, port, pid, tail.clone(), config.stream_stdio);
    }

    // Readiness is advisory: a timeout is logged, not fatal.
    if !config.ready_pattern.is_empty() && !config.ready_timeout.is_zero() {
        match tokio::time::timeout(config.ready_timeout, ready_rx).await {
            Ok(Ok(())) => info!(
                port,
                pid,
                ready_ms = started_at.elapsed().as_millis() as u64,
                ready_token = %config.ready_pattern,
                "worker is ready"
            ),
            _ => warn!(
                port,
                pid,
                timeout = ?config.ready_timeout,
                ready_token = %config.ready_pattern,
                stderr_tail = %tail.snapshot().join("\n"),
                "worker did not report readiness before timeout"
            ),
        }
    }

    let reaper = spawn_reaper(
        child,
        port,
        pid,
        started_at,
        tail,
        cancel.clone(),
        ports.clone(),
    );

    Ok((
        WorkerHandle {
            port,
            endpoint: format!("http://localhost:{port}"),
            pid: pid.map(|p| p as i32),
        },
        reaper,
    ))
}

fn spawn_stdout_reader(
    stdout: impl AsyncRead + Unpin + Send + 'static,
    port: u16,
    pid: Option<u32>,
    ready_pattern: String,
    stream_stdio: bool,
    ready_tx: oneshot::Sender<()>,
) {
    tokio::spawn(async move {
        let mut ready_tx = Some(ready_tx);
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !ready_pattern.is_empty() && line.contains(&ready_pattern) {
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(());
                }
            }
            if stream_stdio {
                debug!(port, pid, stream = "stdout", "{line}");
            }
        }
    });
}

fn spawn_stderr_reader(
    stderr: impl AsyncRead + Unpin + Send + 'static,
    port: u16,
    pid: Option<u32>,
    tail: Arc<StderrTail>,
    stream_stdio: bool,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if stream_stdio {
                debug!(port, pid, stream = "stderr", "{line}");
            }
            tail.push(line);
        }
    });
}

fn spawn_reaper(
    mut child: Child,
    port: u16,
    pid: Option<u32>,
    started_at: Instant,
    tail: Arc<StderrTail>,
    cancel: CancellationToken,
    ports: Arc<PortAllocator>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let natural_exit = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        match natural_exit {
            Some(status) => {
                let duration_ms = started_at.elapsed().as_millis() as u64;
                match status {
                    Ok(status) if status.success() => {
                        info!(port, pid, duration_ms, "worker exited");
                    }
                    Ok(status) => {
                        use std::os::unix::process::ExitStatusExt;
                        error!(
                            port,
                            pid,
                            exit_code = status.code().unwrap_or(-1),
                            signal = status.signal().unwrap_or(0),
                            duration_ms,
                            stderr_tail = %tail.snapshot().join("\n"),
                            "worker exited with error"
                        );
                    }
                    Err(e) => {
                        error!(port, pid, duration_ms, error = %e, "failed to reap worker");
                    }
                }
            }
            None => {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
        ports.release(port);
    })
}

/// Merge the inherited `NODE_OPTIONS` with the defaults workers always
/// get and any configured extras.
fn combined_node_options(extra: &str) -> String {
    let inherited = std::env::var("NODE_OPTIONS").unwrap_or_default();
    let mut parts: Vec<&str> = Vec::new();
    if !inherited.is_empty() {
        parts.push(&inherited);
    }
    parts.push("--enable-source-maps --trace-uncaught");
    if !extra.is_empty() {
        parts.push(extra);
    }
    parts.join(" ")
}

fn send_signal(pid: i32, signal: libc::c_int) {
    // Best effort; the process may already be gone.
    unsafe {
        libc::kill(pid as libc::pid_t, signal);
    }
}
