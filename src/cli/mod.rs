//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use zeroize::Zeroizing;

use crate::bulk::{BulkJob, BulkKind};
use crate::config::Settings;
use crate::errors::{PawError, Result};
use crate::item::{validate_vault_name, ItemType};
use crate::pool::WorkerPool;
use crate::store::{LocalDirStore, RemoteSecretStore, RetryingStore};
use crate::vault::{FileIndexPersister, IndexPersister, VaultSession};

/// Environment variable read by `set` before prompting for the secret.
pub const SECRET_ENV: &str = "PAWKV_SECRET";

/// pawkv CLI: a password manager over a key vault.
#[derive(Parser)]
#[command(
    name = "pawkv",
    about = "Password manager client for a key vault secret store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault to open (default: `default_vault` from .pawkv.toml)
    #[arg(long, global = true, env = "PAWKV_VAULT")]
    pub vault: Option<String>,

    /// Store directory (default: `store_dir` from .pawkv.toml)
    #[arg(long, global = true)]
    pub store_dir: Option<String>,

    /// Maximum concurrent remote calls for bulk commands
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// List items in the vault
    List {
        /// Only items whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Only items of this type (login, note, password, website)
        #[arg(short = 't', long = "type")]
        item_type: Option<ItemType>,
    },

    /// Show an item and its secret value
    Get {
        /// Item name, or part of it
        name: String,

        /// Treat the name as an exact key instead of a search
        #[arg(long)]
        exact: bool,
    },

    /// Create or update an item (secret from PAWKV_SECRET or a prompt)
    Set {
        /// Item name
        name: String,

        /// Item type (default: the existing item's type, or login)
        #[arg(short = 't', long = "type")]
        item_type: Option<ItemType>,

        /// Username (login, website)
        #[arg(short, long)]
        username: Option<String>,

        /// URL (login, website)
        #[arg(long)]
        url: Option<String>,

        /// Free-form note
        #[arg(short, long)]
        note: Option<String>,

        /// Fetch the site's favicon while saving
        #[arg(long)]
        icon: bool,
    },

    /// Delete an item
    Delete {
        /// Item name
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Rename an item
    Rename {
        /// Current name
        old: String,
        /// New name
        new: String,
    },

    /// Check every login and password against a breach corpus
    Audit {
        /// Corpus file of SHA256-HEX:COUNT lines (default: `breach_corpus` from .pawkv.toml)
        #[arg(long)]
        corpus: Option<PathBuf>,
    },

    /// Import items from a JSON archive (all or nothing)
    Import {
        /// Path to the archive
        file: PathBuf,
    },

    /// Export every item to a JSON archive
    Export {
        /// Output file (default: <vault>.export.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Settings and flags resolved for one invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub project_dir: PathBuf,
    pub settings: Settings,
    pub vault: String,
}

impl Context {
    /// Load `.pawkv.toml` from the current directory and apply CLI
    /// overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let project_dir = std::env::current_dir()?;
        let mut settings = Settings::load(&project_dir)?;

        if let Some(dir) = &cli.store_dir {
            settings.store_dir = dir.clone();
        }
        if let Some(workers) = cli.workers {
            settings.max_workers = Some(workers);
        }
        let vault = cli
            .vault
            .clone()
            .unwrap_or_else(|| settings.default_vault.clone());
        validate_vault_name(&vault)?;

        Ok(Self {
            project_dir,
            settings,
            vault,
        })
    }

    /// Open the vault over the local store, with the configured retry
    /// policy on every call.
    pub async fn open_session(&self) -> Result<Arc<VaultSession>> {
        let root = self.settings.store_path(&self.project_dir);
        let local = LocalDirStore::open(&root, &self.vault)?;
        let store: Arc<dyn RemoteSecretStore> =
            Arc::new(RetryingStore::new(local, self.settings.retry_policy()));
        let persister: Arc<dyn IndexPersister> = Arc::new(FileIndexPersister::new(
            self.settings.index_path(&self.project_dir, &self.vault),
        ));
        debug!(root = %root.display(), vault = %self.vault, "opening session");
        let session = VaultSession::open(&self.vault, store, persister).await?;
        Ok(Arc::new(session))
    }

    /// A bulk job that Ctrl-C cancels while the returned guard is alive.
    pub fn bulk_job(&self, kind: BulkKind) -> (BulkJob, CtrlCGuard) {
        let job = BulkJob::new(kind, WorkerPool::new(self.settings.workers()));
        let guard = cancel_on_ctrl_c(job.cancellation_token());
        (job, guard)
    }
}

/// Owns the Ctrl-C listener; dropping it stops listening.
#[derive(Debug)]
pub struct CtrlCGuard {
    listener: JoinHandle<()>,
}

impl CtrlCGuard {
    pub fn is_finished(&self) -> bool {
        self.listener.is_finished()
    }
}

impl Drop for CtrlCGuard {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Cancel `token` on the first Ctrl-C. The listener ends when `token` is
/// cancelled or the guard is dropped.
pub fn cancel_on_ctrl_c(token: CancellationToken) -> CtrlCGuard {
    let listener = tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    output::warning("Interrupted, stopping after running tasks finish...");
                    token.cancel();
                }
            }
        }
    });
    CtrlCGuard { listener }
}

/// Get the secret value for `set`, trying in order:
/// 1. `PAWKV_SECRET` env var (scripts)
/// 2. Interactive hidden prompt with confirmation
///
/// Returns `Zeroizing<String>` so the value is wiped from memory on drop.
pub fn prompt_secret(item_type: ItemType) -> Result<Zeroizing<String>> {
    if let Ok(value) = std::env::var(SECRET_ENV) {
        if !value.is_empty() {
            return Ok(Zeroizing::new(value));
        }
    }

    let label = match item_type {
        ItemType::Note => "Note body",
        _ => "Password",
    };
    let value = dialoguer::Password::new()
        .with_prompt(label)
        .with_confirmation(
            format!("Confirm {}", label.to_lowercase()),
            "Values do not match, try again",
        )
        .interact()
        .map_err(|e| PawError::CommandFailed(format!("secret prompt: {e}")))?;
    Ok(Zeroizing::new(value))
}
