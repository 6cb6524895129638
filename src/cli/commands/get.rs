//! `pawkv get`: show one item, secret value included.
//!
//! Without `--exact` the name is a search: a single match is shown, more
//! than one are listed. With `--exact` the name is read as a key.

use crate::cache::ItemFilter;
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{PawError, Result};

/// Execute the `get` command.
pub async fn execute(cli: &Cli, name: &str, exact: bool) -> Result<()> {
    let ctx = Context::load(cli)?;
    let session = ctx.open_session().await?;

    let target = if exact {
        session.cache().get_exact(name).await?.name
    } else {
        let mut matches = session.list(&ItemFilter::by_name(name)).await;
        match matches.len() {
            0 => return Err(PawError::SecretNotFound(name.to_string())),
            1 => matches.remove(0).name,
            n => {
                // An exact hit wins over longer names containing it.
                if let Some(hit) = matches.iter().find(|m| m.name == name) {
                    hit.name.clone()
                } else {
                    output::info(&format!("{n} items match '{name}':"));
                    output::print_items_table(&matches);
                    output::tip("Narrow the name or pass --exact.");
                    return Ok(());
                }
            }
        }
    };

    let item = session.get(&target).await?;
    output::print_item(&item);

    Ok(())
}
