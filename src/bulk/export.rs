//! Export of a whole vault to a local archive.
//!
//! Values are fetched in parallel and grouped by type. The archive sink
//! is written once, and only after every fetch succeeded, so a failed
//! or cancelled export leaves no partial file behind.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::archive::{Archive, LocalArchive};
use crate::cache::ItemFilter;
use crate::errors::{PawError, Result};
use crate::item::{Item, ItemType};
use crate::progress::{ProgressObserver, ProgressReporter};
use crate::util::lock;
use crate::vault::VaultSession;

use super::BulkJob;

/// Result of a committed export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub exported: usize,
    pub by_type: BTreeMap<ItemType, usize>,
}

/// Fetch every item of `session` and write them to `sink`.
pub async fn export(
    job: &BulkJob,
    session: &Arc<VaultSession>,
    sink: &dyn LocalArchive,
    progress: Arc<dyn ProgressObserver>,
) -> Result<ExportReport> {
    job.start()?;

    let entries = session.cache().search(&ItemFilter::default());
    let reporter = Arc::new(ProgressReporter::new(entries.len(), progress));
    let groups: Arc<Mutex<BTreeMap<ItemType, Vec<Item>>>> = Arc::new(Mutex::new(BTreeMap::new()));

    let tasks = entries.into_iter().map(|meta| {
        let session = Arc::clone(session);
        let reporter = Arc::clone(&reporter);
        let groups = Arc::clone(&groups);
        move || async move {
            let item = session.get(&meta.name).await?;
            lock(&groups).entry(item.item_type()).or_default().push(item);
            reporter.increment();
            Ok::<(), PawError>(())
        }
    });

    let fetched = job.dispatch(tasks).await;
    let groups = std::mem::take(&mut *lock(&groups));
    let outcome = match fetched {
        Ok(()) => write_archive(session, sink, groups).await,
        Err(e) => Err(e),
    };
    job.finish(outcome)
}

async fn write_archive(
    session: &VaultSession,
    sink: &dyn LocalArchive,
    mut groups: BTreeMap<ItemType, Vec<Item>>,
) -> Result<ExportReport> {
    // Completion order is arbitrary; keep the file stable.
    for items in groups.values_mut() {
        items.sort_by(|a, b| a.name().cmp(b.name()));
    }
    let by_type: BTreeMap<ItemType, usize> = groups.iter().map(|(t, v)| (*t, v.len())).collect();
    let archive = Archive::from_groups(groups);
    sink.store(&archive).await?;

    info!(vault = session.name(), items = archive.len(), "export written");
    Ok(ExportReport {
        exported: archive.len(),
        by_type,
    })
}
