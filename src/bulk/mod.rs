//! Bulk operations over a whole vault.
//!
//! This module provides:
//! - `BulkJob`, the per-run state machine and cancellation handle
//! - The audit workflow (`audit`)
//! - The import workflow with rollback (`import`)
//! - The export workflow (`export`)
//!
//! Every workflow runs its per-item work on the job's `WorkerPool` and
//! reports progress through the observer it is given. A job runs once:
//!
//! ```text
//! Idle -> Running -> Committed | Cancelled | Failed
//! Idle -> Failed              (input rejected before any remote call)
//! ```

pub mod audit;
pub mod export;
pub mod import;

use std::fmt;
use std::future::Future;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{PawError, Result};
use crate::pool::WorkerPool;
use crate::util::lock;

pub use audit::{audit, AuditFinding, AuditReport};
pub use export::{export, ExportReport};
pub use import::{import, ImportReport};

/// Which workflow a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkKind {
    Audit,
    Import,
    Export,
}

impl fmt::Display for BulkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BulkKind::Audit => "audit",
            BulkKind::Import => "import",
            BulkKind::Export => "export",
        })
    }
}

/// Lifecycle of a bulk job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkState {
    Idle,
    Running,
    Committed,
    Cancelled,
    Failed,
}

impl BulkState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BulkState::Committed | BulkState::Cancelled | BulkState::Failed
        )
    }

    fn can_move_to(self, next: BulkState) -> bool {
        matches!(
            (self, next),
            (BulkState::Idle, BulkState::Running)
                | (BulkState::Idle, BulkState::Failed)
                | (BulkState::Running, BulkState::Committed)
                | (BulkState::Running, BulkState::Cancelled)
                | (BulkState::Running, BulkState::Failed)
        )
    }
}

/// One user-initiated bulk run.
#[derive(Debug)]
pub struct BulkJob {
    kind: BulkKind,
    pool: WorkerPool,
    token: CancellationToken,
    state: Mutex<BulkState>,
}

impl BulkJob {
    pub fn new(kind: BulkKind, pool: WorkerPool) -> Self {
        Self::with_token(kind, pool, CancellationToken::new())
    }

    /// A job cancelled together with `token`.
    pub fn with_token(kind: BulkKind, pool: WorkerPool, token: CancellationToken) -> Self {
        Self {
            kind,
            pool,
            token,
            state: Mutex::new(BulkState::Idle),
        }
    }

    pub fn kind(&self) -> BulkKind {
        self.kind
    }

    pub fn state(&self) -> BulkState {
        *lock(&self.state)
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Request cancellation. Safe to call any number of times, from any
    /// task, in any state.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(job = %self.kind, "cancellation requested");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Handle for cancelling the job from elsewhere (e.g. a signal task).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn transition(&self, next: BulkState) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.can_move_to(next) {
            return Err(PawError::CommandFailed(format!(
                "{} job cannot move from {:?} to {next:?}",
                self.kind, *state
            )));
        }
        debug!(job = %self.kind, from = ?*state, to = ?next, "job state");
        *state = next;
        Ok(())
    }

    /// Move from Idle to Running. A job that already ran cannot start
    /// again.
    pub(crate) fn start(&self) -> Result<()> {
        self.transition(BulkState::Running)
    }

    /// Mark a job whose input was rejected before it started.
    pub(crate) fn reject(&self, error: PawError) -> PawError {
        if let Err(e) = self.transition(BulkState::Failed) {
            warn!(error = %e, "ignoring invalid job transition");
        }
        warn!(job = %self.kind, error = %error, "job input rejected");
        error
    }

    /// Run one batch on the job's pool under the job's token.
    pub(crate) async fn dispatch<I, F, Fut>(&self, tasks: I) -> Result<()>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.pool.run(&self.token, tasks).await
    }

    /// Record the terminal state matching `outcome` and pass it through.
    pub(crate) fn finish<T>(&self, outcome: Result<T>) -> Result<T> {
        let next = match &outcome {
            Ok(_) => BulkState::Committed,
            Err(PawError::BatchCancelled) => BulkState::Cancelled,
            Err(_) => BulkState::Failed,
        };
        if let Err(e) = self.transition(next) {
            warn!(error = %e, "ignoring invalid job transition");
        }
        match &outcome {
            Ok(_) => info!(job = %self.kind, "job committed"),
            Err(e) => warn!(job = %self.kind, state = ?next, error = %e, "job did not commit"),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> BulkJob {
        BulkJob::new(BulkKind::Export, WorkerPool::new(2))
    }

    #[test]
    fn runs_once() {
        let job = job();
        assert_eq!(job.state(), BulkState::Idle);
        job.start().unwrap();
        assert_eq!(job.state(), BulkState::Running);
        assert!(job.finish(Ok(())).is_ok());
        assert_eq!(job.state(), BulkState::Committed);
        assert!(job.start().is_err());
    }

    #[test]
    fn outcome_picks_terminal_state() {
        let cancelled = job();
        cancelled.start().unwrap();
        let _ = cancelled.finish::<()>(Err(PawError::BatchCancelled));
        assert_eq!(cancelled.state(), BulkState::Cancelled);

        let failed = job();
        failed.start().unwrap();
        let _ = failed.finish::<()>(Err(PawError::BatchFailed(Box::new(
            PawError::RemoteUnavailable("down".into()),
        ))));
        assert_eq!(failed.state(), BulkState::Failed);
        assert!(failed.state().is_terminal());
    }

    #[test]
    fn rejected_input_fails_from_idle() {
        let job = job();
        let err = job.reject(PawError::Archive("bad".into()));
        assert!(matches!(err, PawError::Archive(_)));
        assert_eq!(job.state(), BulkState::Failed);
    }

    #[test]
    fn cancel_is_idempotent() {
        let job = job();
        job.cancel();
        job.cancel();
        assert!(job.is_cancelled());
        assert!(job.cancellation_token().is_cancelled());
        assert_eq!(job.state(), BulkState::Idle);
    }
}
