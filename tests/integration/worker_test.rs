//! Worker pool lifecycle against real child processes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use blastra_core::config::WorkerPoolConfig;
use blastra_core::traits::WorkerDispatch;
use blastra_worker::{PortAllocator, WorkerPool};

fn shell_workers(script: &str, count: usize) -> WorkerPoolConfig {
    WorkerPoolConfig {
        count,
        cwd: ".".into(),
        command: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        external_urls: Vec::new(),
        stream_stdio: false,
        stderr_tail_lines: 32,
        ready_pattern: "BLASTRA_READY".to_string(),
        ready_timeout: Duration::from_secs(2),
        node_options_extra: String::new(),
        debug_env: String::new(),
        force_color: false,
    }
}

#[tokio::test]
async fn workers_receive_distinct_ports() {
    let ports = Arc::new(PortAllocator::new(18000));
    let pool = WorkerPool::start(
        &shell_workers("echo BLASTRA_READY; sleep 30", 2),
        ports,
    )
    .await
    .expect("pool");

    let endpoints: std::collections::HashSet<String> =
        (0..4).filter_map(|_| pool.worker_endpoint()).collect();
    assert_eq!(endpoints.len(), 2);

    pool.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_dispatch_even_for_term_ignoring_workers() {
    let ports = Arc::new(PortAllocator::new(18100));
    // The worker masks SIGTERM; shutdown must still get rid of it.
    let script = r#"trap "" TERM; echo BLASTRA_READY; while true; do sleep 1; done"#;
    let pool = WorkerPool::start(&shell_workers(script, 1), ports)
        .await
        .expect("pool");

    assert!(pool.worker_endpoint().is_some());

    let start = Instant::now();
    pool.shutdown().await;

    assert_eq!(pool.worker_endpoint(), None);
    // Graceful wait plus a small escalation margin.
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let ports = Arc::new(PortAllocator::new(18200));
    let pool = WorkerPool::start(
        &shell_workers("echo BLASTRA_READY; sleep 30", 1),
        ports,
    )
    .await
    .expect("pool");

    pool.shutdown().await;
    pool.shutdown().await;
    assert_eq!(pool.worker_endpoint(), None);
}

#[tokio::test]
async fn worker_env_carries_the_assigned_port() {
    let ports = Arc::new(PortAllocator::new(18300));
    // The worker echoes its PORT back through the readiness line.
    let script = r#"echo "BLASTRA_READY on $PORT"; sleep 30"#;
    let pool = WorkerPool::start(&shell_workers(script, 1), ports)
        .await
        .expect("pool");

    let endpoint = pool.worker_endpoint().expect("endpoint");
    assert_eq!(endpoint, "http://localhost:18300");

    pool.shutdown().await;
}
