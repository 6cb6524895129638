//! One open vault.
//!
//! `VaultSession` owns the secret cache for a vault, the item index built
//! from it, and the persister for the index snapshot. The remote store
//! client is shared with whoever else needs it; the cache is not.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::cache::{ItemFilter, SecretCache};
use crate::errors::{PawError, Result};
use crate::item::{validate_secret_name, validate_vault_name, Item, ItemType, Metadata};
use crate::store::RemoteSecretStore;
use crate::util::lock;

use super::index::{IndexPersister, VaultIndex};

/// An open vault: cache, index and snapshot persister.
#[derive(Debug)]
pub struct VaultSession {
    name: String,
    cache: SecretCache,
    index: Mutex<VaultIndex>,
    persister: Arc<dyn IndexPersister>,
}

impl VaultSession {
    /// Open `name` by listing the remote store into the cache.
    ///
    /// Only metadata is fetched. Favicons, which the store does not keep,
    /// are recovered from the last persisted index snapshot.
    pub async fn open(
        name: &str,
        store: Arc<dyn RemoteSecretStore>,
        persister: Arc<dyn IndexPersister>,
    ) -> Result<Self> {
        validate_vault_name(name)?;

        let listing = store.list_all().await?;
        let listed = listing.len();
        let cache = SecretCache::new(store);
        cache.insert_metadata(listing);

        let previous = match persister.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(vault = name, error = %e, "ignoring unreadable index snapshot");
                None
            }
        };

        let mut index = VaultIndex::new(name);
        for mut meta in cache.search(&ItemFilter::default()) {
            if let Some(prev) = previous.as_ref().and_then(|p| p.get(&meta.name)) {
                meta.favicon = prev.favicon.clone();
            }
            index.insert(meta);
        }

        info!(vault = name, items = listed, "opened vault");
        Ok(Self {
            name: name.to_string(),
            cache,
            index: Mutex::new(index),
            persister,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache(&self) -> &SecretCache {
        &self.cache
    }

    /// Metadata for items matching `filter`, served by the cache.
    pub async fn list(&self, filter: &ItemFilter) -> Vec<Metadata> {
        let mut found = self.cache.list_metadata(filter).await;
        let index = lock(&self.index);
        for meta in &mut found {
            if let Some(known) = index.get(&meta.name) {
                meta.favicon = known.favicon.clone();
            }
        }
        found
    }

    /// Indexed metadata for `name`, without any remote call.
    pub fn metadata(&self, name: &str) -> Option<Metadata> {
        lock(&self.index).get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.index).contains(name)
    }

    /// The full item, value included.
    pub async fn get(&self, name: &str) -> Result<Item> {
        let mut item = self.cache.get_item(name).await?;
        if let Some(known) = self.metadata(name) {
            item.metadata_mut().favicon = known.favicon;
        }
        Ok(item)
    }

    /// Create or overwrite an item and record it in the index.
    pub async fn put(&self, item: &Item) -> Result<Item> {
        let stored = self.cache.put(item).await?;
        self.commit_index(std::slice::from_ref(stored.metadata()))
            .await?;
        Ok(stored)
    }

    /// Like `put`, but refuses to overwrite an existing item.
    pub async fn add(&self, item: &Item) -> Result<Item> {
        if self.contains(item.name()) || self.cache.contains(item.name()) {
            return Err(PawError::SecretAlreadyExists(item.name().to_string()));
        }
        self.put(item).await
    }

    /// Remove an item remotely, from the cache and from the index.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.cache.delete(name).await?;
        let snapshot = {
            let mut index = lock(&self.index);
            index.remove(name);
            index.clone()
        };
        self.persister.persist(&snapshot).await
    }

    /// Rename as delete-old + insert-new. The new item is written first,
    /// so a failure never loses the secret.
    pub async fn rename(&self, old: &str, new: &str) -> Result<Item> {
        validate_secret_name(new)?;
        if old == new {
            return self.get(old).await;
        }
        if self.contains(new) || self.cache.contains(new) {
            return Err(PawError::SecretAlreadyExists(new.to_string()));
        }

        let mut item = self.get(old).await?;
        item.metadata_mut().name = new.to_string();
        let stored = self.put(&item).await?;

        if let Err(e) = self.delete(old).await {
            // Undo the copy so the vault holds the item exactly once.
            if let Err(undo) = self.delete(new).await {
                return Err(PawError::RollbackIncomplete {
                    original: Box::new(e),
                    remaining: vec![format!("{new} ({undo})")],
                });
            }
            return Err(e);
        }

        debug!(vault = %self.name, old, new, "renamed item");
        Ok(stored)
    }

    /// Register `entries` in the index and persist the snapshot.
    ///
    /// All-or-nothing: if the snapshot cannot be written the entries are
    /// taken out of the index again (restoring any they replaced) and
    /// the error is returned.
    pub async fn commit_index(&self, entries: &[Metadata]) -> Result<()> {
        let (snapshot, replaced) = {
            let mut index = lock(&self.index);
            let replaced: Vec<(String, Option<Metadata>)> = entries
                .iter()
                .map(|meta| {
                    let prev = index.get(&meta.name).cloned();
                    index.insert(meta.clone());
                    (meta.name.clone(), prev)
                })
                .collect();
            (index.clone(), replaced)
        };

        if let Err(e) = self.persister.persist(&snapshot).await {
            let mut index = lock(&self.index);
            for (name, prev) in replaced.into_iter().rev() {
                match prev {
                    Some(meta) => index.insert(meta),
                    None => {
                        index.remove(&name);
                    }
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Number of items in the vault.
    pub fn size(&self) -> usize {
        lock(&self.index).len()
    }

    pub fn size_by_type(&self, item_type: ItemType) -> usize {
        lock(&self.index).count_by_type(item_type)
    }

    /// Every indexed item's metadata, sorted by name.
    pub fn entries(&self) -> Vec<Metadata> {
        lock(&self.index).entries().cloned().collect()
    }
}
