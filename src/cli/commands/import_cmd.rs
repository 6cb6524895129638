//! `pawkv import`: import items from a JSON archive.
//!
//! The import is all or nothing: if any item fails to store, the items
//! already written are deleted again.

use std::path::Path;
use std::sync::Arc;

use crate::archive::{JsonFileArchive, LocalArchive};
use crate::bulk::{self, BulkKind};
use crate::cli::output::{self, TermProgress};
use crate::cli::{Cli, Context};
use crate::errors::{PawError, Result};

/// Execute the `import` command.
pub async fn execute(cli: &Cli, file: &Path) -> Result<()> {
    if !file.exists() {
        return Err(PawError::CommandFailed(format!(
            "import file not found: {}",
            file.display()
        )));
    }

    let ctx = Context::load(cli)?;
    let archive = JsonFileArchive::new(file).load().await?;

    if archive.is_empty() {
        output::warning("No items found in the import file.");
        return Ok(());
    }

    let session = ctx.open_session().await?;
    let (job, _interrupt) = ctx.bulk_job(BulkKind::Import);
    let report = bulk::import(
        &job,
        &session,
        archive,
        Arc::new(TermProgress::new("Importing")),
    )
    .await?;

    for name in &report.imported {
        output::info(&format!("  + {name}"));
    }
    output::success(&format!(
        "Imported {} item(s) into vault '{}'",
        report.imported.len(),
        ctx.vault
    ));

    Ok(())
}
