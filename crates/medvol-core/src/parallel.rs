//! CPU-side worker pool for preparing volume data.
//!
//! Work is split along z into one contiguous slab per worker. Workers check a
//! shared cancel flag between slices and count finished slices, so a UI can
//! poll progress while the job runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{MedvolError, Result};

/// Cooperative cancellation signal shared with running workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks all workers to stop after their current slice.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clears the signal so the token can be reused.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Completed-slice counter of a running job.
#[derive(Debug, Default)]
pub struct Progress {
    done: AtomicUsize,
    total: AtomicUsize,
}

impl Progress {
    fn start(&self, total: usize) {
        self.done.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    fn advance(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Fraction of finished slices in `[0, 1]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f32 {
        match self.total() {
            0 => 1.0,
            total => self.done() as f32 / total as f32,
        }
    }
}

/// Runs slice jobs on a fixed number of worker threads.
pub struct Parallelization {
    workers: usize,
    pool: rayon::ThreadPool,
    cancel: CancelToken,
    progress: Arc<Progress>,
}

impl Parallelization {
    /// Creates a pool of `workers` threads (at least one).
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("medvol-worker-{i}"))
            .build()
            .map_err(|e| MedvolError::WorkerPool(e.to_string()))?;
        Ok(Self {
            workers,
            pool,
            cancel: CancelToken::new(),
            progress: Arc::new(Progress::default()),
        })
    }

    /// Creates a pool with one worker per available core.
    pub fn with_available_parallelism() -> Result<Self> {
        Self::new(std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Calls `job(z, slice)` for every `slice_len`-sized slice of `out`.
    ///
    /// Each worker owns a disjoint range of slices. Returns
    /// [`MedvolError::Cancelled`] if the cancel token fired before every slice
    /// was processed; slices already written keep their values.
    pub fn for_each_slice<T, F>(&self, out: &mut [T], slice_len: usize, job: F) -> Result<()>
    where
        T: Send,
        F: Fn(u32, &mut [T]) + Sync,
    {
        if slice_len == 0 || out.len() % slice_len != 0 {
            return Err(MedvolError::SizeMismatch {
                expected: slice_len,
                actual: out.len(),
            });
        }
        let slices = out.len() / slice_len;
        let per_worker = slices.div_ceil(self.workers).max(1);
        self.progress.start(slices);

        let cancel = &self.cancel;
        let progress = &self.progress;
        let job = &job;
        self.pool.install(|| {
            out.par_chunks_mut(per_worker * slice_len)
                .enumerate()
                .for_each(|(worker, slab)| {
                    for (k, slice) in slab.chunks_mut(slice_len).enumerate() {
                        if cancel.is_cancelled() {
                            return;
                        }
                        #[allow(clippy::cast_possible_truncation)]
                        let z = (worker * per_worker + k) as u32;
                        job(z, slice);
                        progress.advance();
                    }
                });
        });

        if self.progress.done() < slices {
            log::info!(
                "parallel job cancelled after {} of {} slices",
                self.progress.done(),
                slices
            );
            return Err(MedvolError::Cancelled);
        }
        Ok(())
    }
}
