//! Fixed-width thread pool for bulk-synchronous hashing.

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::EngineError;

/// A pool of hashing threads whose width is fixed at construction.
pub struct HashPool {
    pool: ThreadPool,
    width: usize,
}

impl HashPool {
    /// Build a pool with exactly `width` threads (at least one).
    pub fn new(width: usize) -> Result<Self, EngineError> {
        let width = width.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|i| format!("snapsync-hash-{}", i))
            .build()
            .map_err(|e| EngineError::WorkerPool {
                message: e.to_string(),
            })?;
        Ok(HashPool { pool, width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Submit one unit per item and block until every unit has finished.
    ///
    /// Units run in no particular order; all of them have completed when this
    /// returns.
    pub fn run_all<T, F>(&self, items: &[T], unit: F)
    where
        T: Sync,
        F: Fn(&T) + Sync,
    {
        let unit = &unit;
        self.pool.scope(|scope| {
            for item in items {
                scope.spawn(move |_| unit(item));
            }
        });
    }
}

impl std::fmt::Debug for HashPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashPool").field("width", &self.width).finish()
    }
}
