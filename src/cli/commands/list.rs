//! `pawkv list`: display items in a table.

use crate::cache::ItemFilter;
use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::Result;
use crate::item::ItemType;

/// Execute the `list` command.
pub async fn execute(cli: &Cli, filter: Option<&str>, item_type: Option<ItemType>) -> Result<()> {
    let ctx = Context::load(cli)?;
    let session = ctx.open_session().await?;

    let filter = ItemFilter {
        name: filter.unwrap_or_default().to_string(),
        types: item_type.into_iter().collect(),
    };
    let items = session.list(&filter).await;

    output::info(&format!(
        "{} vault: {} of {} item(s)",
        ctx.vault,
        items.len(),
        session.size()
    ));

    output::print_items_table(&items);

    Ok(())
}
