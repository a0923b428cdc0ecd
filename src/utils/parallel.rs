//! Worker pool for the compute-heavy phases

use crate::error::{LiftError, Result};
use std::time::Instant;
use tracing::info;

/// Available cores minus one, at least one
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

/// Whether the caller is running on a rayon worker thread.
///
/// Prediction code fans out only when this holds, so calls made after the
/// pool is dropped stay on the calling thread instead of starting rayon's
/// global pool.
pub fn in_worker_pool() -> bool {
    rayon::current_thread_index().is_some()
}

/// Dedicated rayon pool. Work run through [`WorkerPool::install`] uses these
/// threads; the pool shuts down when dropped.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    n_threads: usize,
    started: Instant,
}

impl WorkerPool {
    /// Build a pool with `n_threads` workers, or the default count when `None`
    pub fn new(n_threads: Option<usize>) -> Result<Self> {
        let n_threads = n_threads.unwrap_or_else(default_worker_count);
        if n_threads == 0 {
            return Err(LiftError::Config("worker pool needs at least one thread".to_string()));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("liftsense-worker-{}", i))
            .build()
            .map_err(|e| LiftError::Training(format!("failed to start worker pool: {}", e)))?;

        info!(threads = n_threads, "Worker pool started");
        Ok(Self {
            pool,
            n_threads,
            started: Instant::now(),
        })
    }

    pub fn n_threads(&self) -> usize {
        self.n_threads
    }

    /// Run `op` inside the pool
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        info!(
            threads = self.n_threads,
            secs = self.started.elapsed().as_secs_f64(),
            "Worker pool released"
        );
    }
}
