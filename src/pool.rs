//! Bounded worker pool.
//!
//! Runs a batch of independent tasks with at most `max_workers` in
//! flight. A task starts only after it holds a semaphore permit; the
//! permit is owned by the spawned task and released when the task ends,
//! however it ends.
//!
//! Dispatch stops at the first task error or when the caller's token is
//! cancelled. Tasks already running are left to finish, and `run` only
//! returns once every dispatched task has completed.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{PawError, Result};
use crate::util::lock;

/// Concurrency ceiling used when none is configured.
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get())
}

/// Executes batches under a fixed concurrency ceiling.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    max_workers: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(default_max_workers())
    }
}

impl WorkerPool {
    /// A ceiling of zero is treated as one.
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every task in `tasks`, at most `max_workers` at a time.
    ///
    /// Returns `Ok(())` when every task succeeded and `cancel` was not
    /// triggered, `BatchFailed` wrapping the first task error observed,
    /// or `BatchCancelled` when the caller cancelled. A task error takes
    /// precedence over a concurrent cancellation.
    pub async fn run<I, F, Fut>(&self, cancel: &CancellationToken, tasks: I) -> Result<()>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        // Cancelled by the caller or by the first failing task.
        let stop = cancel.child_token();
        let first_error: Arc<Mutex<Option<PawError>>> = Arc::new(Mutex::new(None));
        let mut running = JoinSet::new();
        let mut dispatched = 0usize;

        for task in tasks {
            let permit = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(p) => p,
                    // The semaphore is never closed while we hold it.
                    Err(_) => break,
                },
            };

            let fut = task();
            let stop = stop.clone();
            let first_error = Arc::clone(&first_error);
            running.spawn(async move {
                let _permit = permit;
                if let Err(e) = fut.await {
                    record_first(&first_error, e);
                    stop.cancel();
                }
            });
            dispatched += 1;
        }

        if stop.is_cancelled() {
            debug!(dispatched, "dispatch stopped early");
        }

        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                record_first(&first_error, PawError::TaskPanicked(e.to_string()));
                stop.cancel();
            }
        }

        let error = lock(&first_error).take();
        match error {
            Some(e) => Err(PawError::BatchFailed(Box::new(e))),
            None if cancel.is_cancelled() => Err(PawError::BatchCancelled),
            None => Ok(()),
        }
    }
}

fn record_first(slot: &Mutex<Option<PawError>>, error: PawError) {
    let mut slot = lock(slot);
    if slot.is_none() {
        *slot = Some(error);
    }
}
