//! `pawkv delete`: remove an item from the vault.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{PawError, Result};

/// Execute the `delete` command.
pub async fn execute(cli: &Cli, name: &str, force: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let session = ctx.open_session().await?;

    if !session.contains(name) {
        return Err(PawError::SecretNotFound(name.to_string()));
    }

    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete item '{name}'?"))
            .default(false)
            .interact()
            .map_err(|e| PawError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    session.delete(name).await?;
    output::success(&format!("Deleted item '{name}'"));

    Ok(())
}
