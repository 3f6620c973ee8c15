//! Dispatch schedulers over caller-supplied worker pools
//!
//! The embedding application owns the worker pool; the coordinator only
//! dispatches onto it. The registry hands out one scheduler per distinct
//! pool, so repeated launch sessions sharing a pool reuse a single scheduler
//! instead of growing one per session.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Execution context supplied by the embedding application
pub struct WorkerPool {
    handle: Handle,
}

impl WorkerPool {
    pub fn new(handle: Handle) -> Arc<Self> {
        Arc::new(Self { handle })
    }

    /// Pool backed by the runtime of the calling task
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Arc<Self> {
        Self::new(Handle::current())
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Dispatches coordinator work onto one worker pool
pub struct Scheduler {
    pool: Arc<WorkerPool>,
}

impl Scheduler {
    fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }

    /// Run a unit of coordinator work on the pool. Callers must not assume
    /// which worker thread the future lands on.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.pool.handle.spawn(future)
    }
}

/// One scheduler per distinct worker pool, memoized for the registry's
/// lifetime. Keyed by pool identity: two pools wrapping the same runtime are
/// still two pools.
#[derive(Default)]
pub struct SchedulerRegistry {
    schedulers: Mutex<HashMap<usize, Arc<Scheduler>>>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic get-or-insert; the map only grows
    pub fn get_or_create(&self, pool: &Arc<WorkerPool>) -> Arc<Scheduler> {
        let key = Arc::as_ptr(pool) as usize;
        let mut schedulers = self.schedulers.lock();
        schedulers
            .entry(key)
            .or_insert_with(|| Arc::new(Scheduler::new(pool.clone())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.schedulers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedulers.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_pool_reuses_scheduler() {
        let registry = SchedulerRegistry::new();
        let pool = WorkerPool::current();

        let a = registry.get_or_create(&pool);
        let b = registry.get_or_create(&pool);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_pools_get_distinct_schedulers() {
        let registry = SchedulerRegistry::new();
        let pool_a = WorkerPool::current();
        let pool_b = WorkerPool::current();

        let a = registry.get_or_create(&pool_a);
        let b = registry.get_or_create(&pool_b);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_spawned_work_runs_on_pool() {
        let registry = SchedulerRegistry::new();
        let scheduler = registry.get_or_create(&WorkerPool::current());
        let result = scheduler.spawn(async { 40 + 2 }).await.unwrap();
        assert_eq!(result, 42);
    }
}
