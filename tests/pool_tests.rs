//! Worker pool and bulk job properties.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use pawkv::bulk::{BulkJob, BulkKind, BulkState};
use pawkv::errors::PawError;
use pawkv::pool::WorkerPool;

/// Tracks tasks currently running and the highest count seen.
#[derive(Default)]
struct InFlight {
    now: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.now.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.now.fetch_sub(1, Ordering::SeqCst);
    }
}

fn random_latency() -> Duration {
    Duration::from_millis(rand::rng().random_range(1..=15))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_exceeds_the_ceiling() {
    for workers in [1, 3, 8] {
        let pool = WorkerPool::new(workers);
        let inflight = Arc::new(InFlight::default());
        let done = Arc::new(AtomicUsize::new(0));

        let tasks = (0..40).map(|_| {
            let inflight = Arc::clone(&inflight);
            let done = Arc::clone(&done);
            let latency = random_latency();
            move || async move {
                inflight.enter();
                tokio::time::sleep(latency).await;
                inflight.leave();
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<(), PawError>(())
            }
        });

        pool.run(&CancellationToken::new(), tasks).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 40);
        let peak = inflight.peak.load(Ordering::SeqCst);
        assert!(peak <= workers, "peak {peak} over ceiling {workers}");
        assert!(peak >= 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reports_one_of_the_failures_and_drains_running_tasks() {
    let pool = WorkerPool::new(4);
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    let failing = [5usize, 9, 13];

    let tasks = (0..30).map(|i| {
        let started = Arc::clone(&started);
        let finished = Arc::clone(&finished);
        let latency = random_latency();
        move || async move {
            started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(latency).await;
            finished.fetch_add(1, Ordering::SeqCst);
            if failing.contains(&i) {
                return Err(PawError::SecretNotFound(format!("item-{i}")));
            }
            Ok(())
        }
    });

    let err = pool.run(&CancellationToken::new(), tasks).await.unwrap_err();
    match err.root_task_error() {
        PawError::SecretNotFound(name) => {
            assert!(["item-5", "item-9", "item-13"].contains(&name.as_str()));
        }
        other => panic!("unexpected error {other:?}"),
    }
    // Every task that started also completed before `run` returned.
    assert_eq!(
        started.load(Ordering::SeqCst),
        finished.load(Ordering::SeqCst)
    );
    assert!(started.load(Ordering::SeqCst) < 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_single_failure_is_the_batch_result() {
    for round in 0..10 {
        let failing = rand::rng().random_range(0..20usize);
        let pool = WorkerPool::new(1 + round % 4);
        let tasks = (0..20).map(|i| {
            let latency = random_latency();
            move || async move {
                tokio::time::sleep(latency).await;
                if i == failing {
                    return Err(PawError::SecretNotFound(format!("item-{i}")));
                }
                Ok(())
            }
        });

        let err = pool.run(&CancellationToken::new(), tasks).await.unwrap_err();
        let expected = format!("item-{failing}");
        assert!(
            matches!(err.root_task_error(), PawError::SecretNotFound(n) if *n == expected),
            "round {round}: got {err:?}"
        );
    }
}

#[tokio::test]
async fn only_the_first_error_is_kept() {
    let pool = WorkerPool::new(1);
    let order = Arc::new(Mutex::new(Vec::new()));
    let tasks = (0..4).map(|i| {
        let order = Arc::clone(&order);
        move || async move {
            order.lock().unwrap().push(i);
            Err::<(), _>(PawError::SecretNotFound(format!("item-{i}")))
        }
    });

    let err = pool.run(&CancellationToken::new(), tasks).await.unwrap_err();
    assert!(matches!(err.root_task_error(), PawError::SecretNotFound(n) if n == "item-0"));
    assert_eq!(*order.lock().unwrap(), [0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_stops_dispatch() {
    let pool = WorkerPool::new(2);
    let token = CancellationToken::new();
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let tasks = (0..50).map(|i| {
        let token = token.clone();
        let started = Arc::clone(&started);
        let finished = Arc::clone(&finished);
        move || async move {
            started.fetch_add(1, Ordering::SeqCst);
            if i == 3 {
                token.cancel();
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
            finished.fetch_add(1, Ordering::SeqCst);
            Ok::<(), PawError>(())
        }
    });

    let err = pool.run(&token, tasks).await.unwrap_err();
    assert!(matches!(err, PawError::BatchCancelled));
    assert!(started.load(Ordering::SeqCst) < 50);
    assert_eq!(
        started.load(Ordering::SeqCst),
        finished.load(Ordering::SeqCst)
    );
}

#[test]
fn cancel_is_idempotent() {
    let job = BulkJob::new(BulkKind::Export, WorkerPool::new(2));
    assert!(!job.is_cancelled());
    job.cancel();
    job.cancel();
    assert!(job.is_cancelled());
    assert!(job.cancellation_token().is_cancelled());
    assert_eq!(job.state(), BulkState::Idle);
}

#[test]
fn external_token_cancels_the_job() {
    let token = CancellationToken::new();
    let job = BulkJob::with_token(BulkKind::Import, WorkerPool::new(1), token.clone());
    token.cancel();
    assert!(job.is_cancelled());
}
