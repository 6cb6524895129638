//! `pawkv rename`: give an item a new name.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::Result;

/// Execute the `rename` command.
pub async fn execute(cli: &Cli, old: &str, new: &str) -> Result<()> {
    let ctx = Context::load(cli)?;
    let session = ctx.open_session().await?;

    session.rename(old, new).await?;
    output::success(&format!("Renamed '{old}' to '{new}'"));

    Ok(())
}
