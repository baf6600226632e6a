//! Execution context: compute backend selection and cancellation.
//!
//! Backend choice is an explicit parameter of every run instead of process-wide
//! state. It only affects how per-point work is scheduled; results are the same
//! on every backend up to floating-point summation order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Requested compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Backend {
    /// Single-threaded loops over points.
    #[default]
    Sequential,
    /// Data-parallel loops on a dedicated rayon pool of `threads` workers (at least 1).
    Parallel { threads: usize },
}

/// Shared cancellation flag checked at every iteration boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing flag, e.g. one set by a signal handler.
    pub fn from_arc(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run execution context.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pool: Option<Arc<rayon::ThreadPool>>,
    cancel: CancelFlag,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::sequential()
    }
}

impl ExecutionContext {
    /// Create a context for the requested backend.
    ///
    /// If a parallel pool cannot be created the context falls back to
    /// sequential execution; the run itself is unaffected.
    pub fn new(backend: Backend) -> Self {
        let pool = match backend {
            Backend::Sequential => None,
            Backend::Parallel { threads } => {
                match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                    Ok(pool) => {
                        debug!(threads = pool.current_num_threads(), "parallel backend ready");
                        Some(Arc::new(pool))
                    }
                    Err(e) => {
                        warn!("Failed to create thread pool ({e}), falling back to sequential");
                        None
                    }
                }
            }
        };

        Self {
            pool,
            cancel: CancelFlag::new(),
        }
    }

    pub fn sequential() -> Self {
        Self::new(Backend::Sequential)
    }

    /// Attach an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Backend actually in use after any fallback.
    pub fn active_backend(&self) -> Backend {
        match &self.pool {
            Some(pool) => Backend::Parallel {
                threads: pool.current_num_threads(),
            },
            None => Backend::Sequential,
        }
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Ordered map over `0..len`.
    pub fn map<T, F>(&self, len: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(|| (0..len).into_par_iter().map(&f).collect()),
            None => (0..len).map(f).collect(),
        }
    }

    /// Map every index and combine the results with an associative `reduce`.
    pub fn map_reduce<T, I, M, R>(&self, len: usize, identity: I, map: M, reduce: R) -> T
    where
        T: Send,
        I: Fn() -> T + Sync + Send,
        M: Fn(usize) -> T + Sync + Send,
        R: Fn(T, T) -> T + Sync + Send,
    {
        match &self.pool {
            Some(pool) => {
                pool.install(|| (0..len).into_par_iter().map(&map).reduce(&identity, &reduce))
            }
            None => (0..len).map(map).fold(identity(), reduce),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_default() {
        let ctx = ExecutionContext::default();
        assert_eq!(ctx.active_backend(), Backend::Sequential);
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_parallel_backend() {
        let ctx = ExecutionContext::new(Backend::Parallel { threads: 2 });
        assert_eq!(ctx.active_backend(), Backend::Parallel { threads: 2 });
    }

    #[test]
    fn test_map_preserves_order() {
        for ctx in [
            ExecutionContext::sequential(),
            ExecutionContext::new(Backend::Parallel { threads: 3 }),
        ] {
            let squares = ctx.map(100, |i| i * i);
            assert_eq!(squares, (0..100).map(|i| i * i).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_map_reduce_sum() {
        for ctx in [
            ExecutionContext::sequential(),
            ExecutionContext::new(Backend::Parallel { threads: 4 }),
        ] {
            let sum = ctx.map_reduce(1000, || 0usize, |i| i, |a, b| a + b);
            assert_eq!(sum, 999 * 1000 / 2);
        }
    }

    #[test]
    fn test_cancel_flag_shared() {
        let flag = CancelFlag::new();
        let ctx = ExecutionContext::sequential().with_cancel_flag(flag.clone());
        assert!(!ctx.is_cancelled());
        flag.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_backend_serde() {
        let backend: Backend = serde_json::from_str(r#"{"kind":"parallel","threads":4}"#).unwrap();
        assert_eq!(backend, Backend::Parallel { threads: 4 });
        let backend: Backend = serde_json::from_str(r#"{"kind":"sequential"}"#).unwrap();
        assert_eq!(backend, Backend::Sequential);
    }
}
