//! Import of an archive into a vault, all or nothing.
//!
//! Phase 1 writes every item through the cache in parallel and records
//! each one the store accepted. Phase 2 registers those items in the
//! vault index and persists the snapshot in one step. If anything fails
//! in either phase, or the job is cancelled, every recorded item is
//! deleted again so the vault ends up as it was before the import.
//!
//! Input is checked before the job starts: the archive must be
//! consistent, every item must be writable, and no item may share a
//! name with one already in the vault. Rollback therefore only ever
//! deletes secrets this import created.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::archive::Archive;
use crate::errors::{PawError, Result};
use crate::item::{validate_secret_name, Metadata};
use crate::progress::{ProgressObserver, ProgressReporter};
use crate::util::lock;
use crate::vault::VaultSession;

use super::BulkJob;

/// Result of a committed import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Names of the imported items, sorted.
    pub imported: Vec<String>,
}

/// Import every item of `archive` into `session`.
pub async fn import(
    job: &BulkJob,
    session: &Arc<VaultSession>,
    archive: Archive,
    progress: Arc<dyn ProgressObserver>,
) -> Result<ImportReport> {
    if let Err(e) = check_input(session, &archive) {
        return Err(job.reject(e));
    }
    job.start()?;

    let items = archive.into_items();
    let reporter = Arc::new(ProgressReporter::new(items.len(), progress));
    let processed: Arc<Mutex<Vec<Metadata>>> = Arc::new(Mutex::new(Vec::new()));

    // Phase 1: parallel writes, tracking what landed.
    let tasks = items.into_iter().map(|item| {
        let session = Arc::clone(session);
        let reporter = Arc::clone(&reporter);
        let processed = Arc::clone(&processed);
        move || async move {
            let stored = session.cache().put(&item).await?;
            lock(&processed).push(stored.metadata().clone());
            reporter.increment();
            Ok::<(), PawError>(())
        }
    });
    let written = job.dispatch(tasks).await;

    let processed = std::mem::take(&mut *lock(&processed));

    // Phase 2: one index commit, strictly after every write finished.
    let committed = match written {
        Ok(()) => session.commit_index(&processed).await,
        Err(e) => Err(e),
    };

    let outcome = match committed {
        Ok(()) => {
            let mut imported: Vec<String> = processed.into_iter().map(|m| m.name).collect();
            imported.sort();
            info!(vault = session.name(), items = imported.len(), "import committed");
            Ok(ImportReport { imported })
        }
        Err(e) => Err(rollback(job, session, &processed, e).await),
    };
    job.finish(outcome)
}

/// Reject input that would clash with the vault or the store.
fn check_input(session: &VaultSession, archive: &Archive) -> Result<()> {
    // Duplicate names within the archive are caught here.
    archive.validate()?;
    for item in archive.items() {
        let name = item.name();
        validate_secret_name(name)?;
        item.content_fields().validate(name)?;
        if session.contains(name) || session.cache().contains(name) {
            return Err(PawError::SecretAlreadyExists(name.to_string()));
        }
    }
    Ok(())
}

/// Delete every processed item, returning the error to report.
///
/// Runs on its own token: a cancelled job still has to clean up. Every
/// delete is attempted; the ones that fail are listed in
/// `RollbackIncomplete` next to the error that caused the rollback.
async fn rollback(
    job: &BulkJob,
    session: &Arc<VaultSession>,
    processed: &[Metadata],
    cause: PawError,
) -> PawError {
    if processed.is_empty() {
        return cause;
    }
    warn!(
        vault = session.name(),
        items = processed.len(),
        error = %cause,
        "rolling back import"
    );

    let leftovers: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let tasks = processed.iter().map(|meta| {
        let session = Arc::clone(session);
        let leftovers = Arc::clone(&leftovers);
        let name = meta.name.clone();
        move || async move {
            if let Err(e) = session.cache().delete(&name).await {
                warn!(name = %name, error = %e, "rollback delete failed");
                lock(&leftovers).push(name);
            }
            Ok::<(), PawError>(())
        }
    });

    if let Err(e) = job.pool().run(&CancellationToken::new(), tasks).await {
        // Tasks never return errors, so only a panic lands here.
        warn!(error = %e, "rollback batch did not finish cleanly");
    }

    let mut remaining = std::mem::take(&mut *lock(&leftovers));
    // A delete that never ran (panicked batch) leaves its item behind too.
    for meta in processed {
        if session.cache().contains(&meta.name) && !remaining.contains(&meta.name) {
            remaining.push(meta.name.clone());
        }
    }

    if remaining.is_empty() {
        info!(vault = session.name(), "import rolled back");
        cause
    } else {
        remaining.sort();
        PawError::RollbackIncomplete {
            original: Box::new(cause),
            remaining,
        }
    }
}
