//! `pawkv audit`: check stored passwords against a breach corpus.
//!
//! Usage:
//!   pawkv audit --corpus pwned.txt   # corpus of SHA256-HEX:COUNT lines
//!   pawkv audit                      # corpus from `breach_corpus` in .pawkv.toml

use std::path::PathBuf;
use std::sync::Arc;

use crate::breach::CorpusBreachChecker;
use crate::bulk::{self, BulkKind};
use crate::cli::output::{self, TermProgress};
use crate::cli::{Cli, Context};
use crate::errors::{PawError, Result};

/// Execute the `audit` command.
pub async fn execute(cli: &Cli, corpus: Option<PathBuf>) -> Result<()> {
    let ctx = Context::load(cli)?;

    let corpus = corpus
        .or_else(|| ctx.settings.breach_corpus.clone())
        .ok_or_else(|| {
            PawError::CommandFailed(
                "no breach corpus: pass --corpus or set breach_corpus in .pawkv.toml".into(),
            )
        })?;
    let checker = Arc::new(CorpusBreachChecker::load(&ctx.project_dir.join(corpus))?);

    let session = ctx.open_session().await?;
    let (job, _interrupt) = ctx.bulk_job(BulkKind::Audit);
    let report = bulk::audit(
        &job,
        &session,
        checker,
        Arc::new(TermProgress::new("Auditing")),
    )
    .await?;

    if report.is_clean() {
        output::success(&format!(
            "No breached passwords among {} checked item(s)",
            report.checked
        ));
        return Ok(());
    }

    output::warning(&format!(
        "{} of {} item(s) use a breached password",
        report.findings.len(),
        report.checked
    ));
    output::print_findings_table(&report.findings);
    output::tip("Change these passwords, then run `pawkv set <NAME>` to update them.");

    Ok(())
}
