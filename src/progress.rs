//! Progress reporting for bulk jobs.
//!
//! The engine only knows the `ProgressObserver` trait; how progress is
//! shown (a terminal line, a GUI bar, nothing) is up to the caller, which
//! passes an observer into each workflow call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Receives `(completed, total)` after every finished unit of work.
///
/// Calls may arrive from several worker tasks at once and in any order;
/// each call carries a distinct `completed` value.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// Observer that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Shared completion counter for one bulk job.
pub struct ProgressReporter {
    completed: AtomicUsize,
    total: usize,
    observer: Arc<dyn ProgressObserver>,
}

impl ProgressReporter {
    pub fn new(total: usize, observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
            observer,
        }
    }

    /// Record one finished unit and notify the observer. Returns the
    /// running total including this unit.
    pub fn increment(&self) -> usize {
        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        self.observer.on_progress(completed, self.total);
        completed
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("completed", &self.completed())
            .field("total", &self.total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closure_observer_sees_every_step() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(
            3,
            Arc::new(move |done: usize, total: usize| sink.lock().unwrap().push((done, total))),
        );

        assert_eq!(reporter.increment(), 1);
        assert_eq!(reporter.increment(), 2);
        assert_eq!(reporter.increment(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let reporter = Arc::new(ProgressReporter::new(8000, Arc::new(NoProgress)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&reporter);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        r.increment();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reporter.completed(), 8000);
    }
}
