//! `pawkv export`: write every item to a JSON archive.
//!
//! The archive groups items by type:
//! `{ "login": [ ... ], "note": [ ... ] }`.
//! Nothing is written unless every item could be read.

use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::JsonFileArchive;
use crate::bulk::{self, BulkKind};
use crate::cli::output::{self, TermProgress};
use crate::cli::{Cli, Context};
use crate::errors::{PawError, Result};

/// Execute the `export` command.
pub async fn execute(cli: &Cli, output_path: Option<PathBuf>) -> Result<()> {
    let ctx = Context::load(cli)?;
    let dest = output_path.unwrap_or_else(|| PathBuf::from(format!("{}.export.json", ctx.vault)));

    // Safety: refuse to overwrite the store's own documents.
    let store_dir = ctx.settings.store_path(&ctx.project_dir);
    if std::path::absolute(&dest).is_ok_and(|abs| abs.starts_with(&store_dir)) {
        return Err(PawError::CommandFailed(format!(
            "refusing to export into the store directory {}",
            store_dir.display()
        )));
    }

    let session = ctx.open_session().await?;
    let (job, _interrupt) = ctx.bulk_job(BulkKind::Export);
    let sink = JsonFileArchive::new(&dest);
    let report = bulk::export(
        &job,
        &session,
        &sink,
        Arc::new(TermProgress::new("Exporting")),
    )
    .await?;

    let summary: Vec<String> = report
        .by_type
        .iter()
        .map(|(item_type, count)| format!("{count} {item_type}"))
        .collect();
    output::success(&format!(
        "Exported {} item(s) to {} ({})",
        report.exported,
        dest.display(),
        if summary.is_empty() {
            "empty".to_string()
        } else {
            summary.join(", ")
        }
    ));

    Ok(())
}
