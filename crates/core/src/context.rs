//! Per-run execution context
//!
//! Owns the worker pool and progress settings. Nothing here is global, so
//! independent runs can share a process without interfering.

use std::num::NonZeroUsize;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;
use crate::progress::Progress;

pub struct ScanContext {
    pool: ThreadPool,
    threads: NonZeroUsize,
    progress: Progress,
}

impl ScanContext {
    /// Build a context with a dedicated pool of exactly `threads` workers
    ///
    /// # Errors
    /// Returns an error if the pool's threads cannot be spawned
    pub fn new(threads: NonZeroUsize, progress: Progress) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.get())
            .thread_name(|i| format!("backfill-worker-{i}"))
            .build()?;
        Ok(Self {
            pool,
            threads,
            progress,
        })
    }

    /// Single worker, no progress signal
    ///
    /// # Errors
    /// Returns an error if the worker thread cannot be spawned
    pub fn single_threaded() -> Result<Self> {
        Self::new(NonZeroUsize::MIN, Progress::disabled())
    }

    #[must_use]
    pub fn threads(&self) -> NonZeroUsize {
        self.threads
    }

    #[must_use]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Run `op` inside the worker pool; parallel iterators it creates use only these workers
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }

    /// Run two closures, potentially in parallel on the pool
    pub fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        self.pool.join(a, b)
    }
}

impl std::fmt::Debug for ScanContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanContext")
            .field("threads", &self.threads)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}
