use crate::error::{ProcessingError, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Instant;
use tracing::debug;

/// Worker pool scoped to a single aggregation. The pool is torn down when the
/// context is dropped, whichever way the aggregation exits.
pub struct ComputeContext {
    pool: ThreadPool,
    workers: usize,
    acquired_at: Instant,
}

impl ComputeContext {
    pub fn acquire(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("zonal-worker-{}", i))
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        debug!(workers, "Acquired compute context");
        Ok(Self {
            pool,
            workers,
            acquired_at: Instant::now(),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `op` with this context's pool as the rayon pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl Drop for ComputeContext {
    fn drop(&mut self) {
        debug!(
            workers = self.workers,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "Released compute context"
        );
    }
}
