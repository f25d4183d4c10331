//! Worker Pool
//!
//! Fixed-size pool running population work and the start-up load off the
//! caller's thread.

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{CacheError, Result};

/// A dedicated tokio runtime whose blocking pool is capped at `size` threads.
///
/// Work beyond `size` concurrent jobs queues until a thread frees up, so a
/// saturated pool delays work but never deadlocks. Dropping the pool shuts
/// it down in the background; jobs that have not started yet are abandoned.
#[derive(Debug)]
pub struct WorkerPool {
    runtime: Option<Runtime>,
    size: usize,
}

impl WorkerPool {
    /// Builds a pool with `size` blocking threads (at least one).
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(size)
            .thread_name("coldstorage-worker")
            .enable_all()
            .build()
            .map_err(|e| CacheError::WorkerPool(e.to_string()))?;

        debug!(size, "worker pool started");
        Ok(Self {
            runtime: Some(runtime),
            size,
        })
    }

    /// Number of threads available for blocking work.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Handle to the pool's runtime.
    pub fn handle(&self) -> Result<&Handle> {
        self.runtime
            .as_ref()
            .map(Runtime::handle)
            .ok_or_else(|| CacheError::WorkerPool("worker pool is shut down".to_string()))
    }

    /// Runs `job` on one of the pool threads.
    pub fn spawn<F, R>(&self, job: F) -> Result<JoinHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        Ok(self.handle()?.spawn_blocking(job))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            debug!("worker pool shut down");
        }
    }
}
