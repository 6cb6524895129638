//! `pawkv set`: create or update an item.
//!
//! Fields not given on the command line keep their current value when
//! the item already exists. With `--icon` the site's favicon is fetched
//! while the secret is being entered.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cli::output;
use crate::cli::{prompt_secret, Cli, Context};
use crate::errors::{PawError, Result};
use crate::favicon::FaviconTask;
use crate::item::{ContentFields, Item, ItemType, Metadata};

/// How long `set` waits for a favicon once the secret is entered.
const ICON_WAIT: Duration = Duration::from_secs(10);

/// Field values given on the command line.
#[derive(Debug, Default)]
pub struct SetOptions {
    pub item_type: Option<ItemType>,
    pub username: Option<String>,
    pub url: Option<String>,
    pub note: Option<String>,
    pub icon: bool,
}

/// Execute the `set` command.
pub async fn execute(cli: &Cli, name: &str, opts: SetOptions) -> Result<()> {
    let ctx = Context::load(cli)?;
    let session = ctx.open_session().await?;

    let existing = if session.contains(name) {
        Some(session.get(name).await?)
    } else {
        None
    };

    let item_type = match (opts.item_type, &existing) {
        (Some(wanted), Some(current)) if wanted != current.item_type() => {
            return Err(PawError::CommandFailed(format!(
                "'{name}' is a {}; delete it first to store a {wanted}",
                current.item_type()
            )));
        }
        (Some(wanted), _) => wanted,
        (None, Some(current)) => current.item_type(),
        (None, None) => ItemType::Login,
    };

    let current = existing
        .as_ref()
        .map(Item::content_fields)
        .unwrap_or_default();
    let fields = ContentFields {
        username: opts.username.unwrap_or(current.username),
        url: opts.url.unwrap_or(current.url),
        note: opts.note.unwrap_or(current.note),
    };
    // Fail before prompting if the store would reject the fields.
    fields.validate(name)?;

    let root = CancellationToken::new();
    let icon_task = if opts.icon {
        spawn_icon_task(&fields.url, &root)
    } else {
        None
    };

    let secret = prompt_secret(item_type)?;

    let mut metadata = existing
        .as_ref()
        .map(|item| item.metadata().clone())
        .unwrap_or_else(|| Metadata::new(name, item_type));
    metadata.item_type = item_type;

    if let Some(task) = icon_task {
        let host = task.host().to_string();
        match task.wait_for(ICON_WAIT).await {
            Ok(Some(icon)) => metadata.favicon = Some(icon),
            Ok(None) => output::warning(&format!("No favicon for {host} in time, skipping")),
            Err(e) => output::warning(&format!("Could not fetch favicon for {host}: {e}")),
        }
    }
    root.cancel();

    let item = Item::assemble(metadata, fields, secret.to_string());
    let verb = if existing.is_some() { "Updated" } else { "Added" };
    session.put(&item).await?;

    output::success(&format!("{verb} {item_type} '{name}' in vault '{}'", ctx.vault));

    Ok(())
}

#[cfg(feature = "favicon-http")]
fn spawn_icon_task(url: &str, root: &CancellationToken) -> Option<FaviconTask> {
    let source = std::sync::Arc::new(crate::favicon::HttpFaviconSource);
    let task = FaviconTask::spawn(source, url, root);
    if task.is_none() {
        output::warning("No URL to fetch a favicon for.");
    }
    task
}

#[cfg(not(feature = "favicon-http"))]
fn spawn_icon_task(_url: &str, _root: &CancellationToken) -> Option<FaviconTask> {
    output::warning("Favicon download is not enabled in this build.");
    None
}
