//! Worker pool trait for SSR render dispatch.

use async_trait::async_trait;

/// Dispatch surface of a render worker pool.
///
/// A disabled pool satisfies this trivially: `worker_endpoint` yields
/// `None` and `shutdown` is a no-op.
#[async_trait]
pub trait WorkerDispatch: Send + Sync + std::fmt::Debug + 'static {
    /// The endpoint of the next worker in round-robin order, or `None`
    /// when the pool is disabled or empty.
    fn worker_endpoint(&self) -> Option<String>;

    /// Stop all local workers. Safe to call more than once.
    async fn shutdown(&self);
}
