//! The vault's own item index and its on-disk snapshot.
//!
//! The index maps item name to `Metadata` and is what a session shows
//! without asking the cache. A snapshot of it is persisted after every
//! committed change. The remote store stays the source of truth: the
//! snapshot is only read back at open time to recover data the store
//! does not keep, such as favicons.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{PawError, Result};
use crate::item::{ItemType, Metadata};
use crate::store::local::write_atomic;
use crate::util::lock;

/// Name-ordered metadata of every item in a vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultIndex {
    vault: String,
    items: BTreeMap<String, Metadata>,
}

impl VaultIndex {
    pub fn new(vault: impl Into<String>) -> Self {
        Self {
            vault: vault.into(),
            items: BTreeMap::new(),
        }
    }

    pub fn vault(&self) -> &str {
        &self.vault
    }

    /// Insert or replace the entry for `meta.name`.
    pub fn insert(&mut self, meta: Metadata) {
        self.items.insert(meta.name.clone(), meta);
    }

    pub fn remove(&mut self, name: &str) -> Option<Metadata> {
        self.items.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Metadata> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count_by_type(&self, item_type: ItemType) -> usize {
        self.items
            .values()
            .filter(|m| m.item_type == item_type)
            .count()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Metadata> {
        self.items.values()
    }
}

/// Persists index snapshots.
#[async_trait]
pub trait IndexPersister: Send + Sync + std::fmt::Debug {
    /// The last persisted snapshot, if any.
    async fn load(&self) -> Result<Option<VaultIndex>>;

    async fn persist(&self, index: &VaultIndex) -> Result<()>;
}

/// Index snapshot kept as a JSON file next to the local store.
#[derive(Debug, Clone)]
pub struct FileIndexPersister {
    path: PathBuf,
}

impl FileIndexPersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn index_error(&self, reason: impl std::fmt::Display) -> PawError {
        PawError::Index {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl IndexPersister for FileIndexPersister {
    async fn load(&self) -> Result<Option<VaultIndex>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.index_error(e)),
        };
        let index = serde_json::from_str(&raw).map_err(|e| self.index_error(e))?;
        Ok(Some(index))
    }

    async fn persist(&self, index: &VaultIndex) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(index).map_err(|e| self.index_error(e))?;
        write_atomic(&self.path, &bytes)
            .await
            .map_err(|e| self.index_error(e))?;
        debug!(path = %self.path.display(), items = index.len(), "persisted index snapshot");
        Ok(())
    }
}

/// Keeps snapshots in memory. Persisting can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryIndexPersister {
    last: Mutex<Option<VaultIndex>>,
    persists: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryIndexPersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `persist` fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful persists.
    pub fn persists(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<VaultIndex> {
        lock(&self.last).clone()
    }
}

#[async_trait]
impl IndexPersister for MemoryIndexPersister {
    async fn load(&self) -> Result<Option<VaultIndex>> {
        Ok(self.last())
    }

    async fn persist(&self, index: &VaultIndex) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PawError::Index {
                path: PathBuf::from("<memory>"),
                reason: "injected persist failure".into(),
            });
        }
        *lock(&self.last) = Some(index.clone());
        self.persists.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
