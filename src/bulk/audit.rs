//! Breach audit of every credential in a vault.
//!
//! Read-only: nothing is written, so a failed or cancelled audit has
//! nothing to undo and simply keeps no partial findings.

use std::sync::{Arc, Mutex};

use crate::breach::BreachChecker;
use crate::cache::ItemFilter;
use crate::errors::{PawError, Result};
use crate::item::{Item, ItemType};
use crate::progress::{ProgressObserver, ProgressReporter};
use crate::util::lock;
use crate::vault::VaultSession;

use super::BulkJob;

/// Item types whose password is checked.
pub const AUDITED_TYPES: [ItemType; 2] = [ItemType::Login, ItemType::Password];

/// A credential found in the breach corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFinding {
    pub item: Item,
    pub count: u64,
}

impl AuditFinding {
    pub fn name(&self) -> &str {
        self.item.name()
    }
}

/// Result of a committed audit.
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    /// Items checked.
    pub checked: usize,
    /// Breached items, most occurrences first.
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Check every login and password item against `checker`.
pub async fn audit(
    job: &BulkJob,
    session: &Arc<VaultSession>,
    checker: Arc<dyn BreachChecker>,
    progress: Arc<dyn ProgressObserver>,
) -> Result<AuditReport> {
    job.start()?;

    let targets = session.cache().search(&ItemFilter::by_types(&AUDITED_TYPES));
    let checked = targets.len();
    let reporter = Arc::new(ProgressReporter::new(checked, progress));
    let findings: Arc<Mutex<Vec<AuditFinding>>> = Arc::new(Mutex::new(Vec::new()));

    let tasks = targets.into_iter().map(|meta| {
        let session = Arc::clone(session);
        let checker = Arc::clone(&checker);
        let reporter = Arc::clone(&reporter);
        let findings = Arc::clone(&findings);
        move || async move {
            let item = session.cache().get_item(&meta.name).await?;
            let status = checker.check(&item).await?;
            if status.is_breached() {
                lock(&findings).push(AuditFinding {
                    item,
                    count: status.count,
                });
            }
            reporter.increment();
            Ok::<(), PawError>(())
        }
    });

    let outcome = job.dispatch(tasks).await.map(|()| {
        let mut findings = std::mem::take(&mut *lock(&findings));
        findings.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name().cmp(b.name())));
        AuditReport { checked, findings }
    });
    job.finish(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breach::CorpusBreachChecker;
    use crate::bulk::{BulkKind, BulkState};
    use crate::pool::WorkerPool;
    use crate::progress::NoProgress;
    use crate::store::{MemoryStore, RemoteSecretStore};
    use crate::vault::{IndexPersister, MemoryIndexPersister};

    async fn session(store: &Arc<MemoryStore>) -> Arc<VaultSession> {
        let session = VaultSession::open(
            "team",
            Arc::clone(store) as Arc<dyn RemoteSecretStore>,
            Arc::new(MemoryIndexPersister::new()) as Arc<dyn IndexPersister>,
        )
        .await
        .unwrap();
        Arc::new(session)
    }

    #[tokio::test]
    async fn notes_and_websites_are_not_audited() {
        let store = Arc::new(MemoryStore::new());
        store.insert("n1", "hunter2", Some("note|||"));
        store.insert("shop", "hunter2", Some("website|bob|shop.example|"));
        store.insert("pin", "hunter2", Some("password|||"));
        let session = session(&store).await;

        let checker = Arc::new(CorpusBreachChecker::from_passwords([("hunter2", 5)]));
        let job = BulkJob::new(BulkKind::Audit, WorkerPool::new(2));
        let report = audit(&job, &session, checker, Arc::new(NoProgress))
            .await
            .unwrap();

        assert_eq!(report.checked, 1);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].name(), "pin");
        assert_eq!(job.state(), BulkState::Committed);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_no_findings() {
        let store = Arc::new(MemoryStore::new());
        store.insert("a", "hunter2", Some("login|||"));
        store.insert("b", "hunter2", Some("login|||"));
        store.fail_get_for("b");
        let session = session(&store).await;

        let checker = Arc::new(CorpusBreachChecker::from_passwords([("hunter2", 5)]));
        let job = BulkJob::new(BulkKind::Audit, WorkerPool::new(1));
        let err = audit(&job, &session, checker, Arc::new(NoProgress))
            .await
            .unwrap_err();

        assert!(matches!(
            err.root_task_error(),
            PawError::RemoteUnavailable(_)
        ));
        assert_eq!(job.state(), BulkState::Failed);
    }

    #[tokio::test]
    async fn empty_vault_is_clean() {
        let store = Arc::new(MemoryStore::new());
        let session = session(&store).await;
        let job = BulkJob::new(BulkKind::Audit, WorkerPool::new(4));
        let report = audit(
            &job,
            &session,
            Arc::new(CorpusBreachChecker::default()),
            Arc::new(NoProgress),
        )
        .await
        .unwrap();
        assert!(report.is_clean());
        assert_eq!(report.checked, 0);
    }
}
