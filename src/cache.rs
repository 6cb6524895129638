//! In-memory secret cache in front of the remote store.
//!
//! Metadata is served from memory; secret values are fetched on first
//! use and kept for the life of the session. A value that has been read
//! once is never read again: the cache does not revalidate.
//!
//! Mutations go to the remote store first and only touch the cache when
//! the store accepted them, so the cache never claims something the
//! store does not hold.
//!
//! Worker tasks share one cache. The map sits behind a mutex that is
//! never held across a remote call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;
use zeroize::Zeroizing;

use crate::errors::{PawError, Result};
use crate::item::content::{decode_tag, encode_tag};
use crate::item::{validate_secret_name, ContentFields, Item, ItemType, Metadata};
use crate::store::{RemoteMetadata, RemoteSecret, RemoteSecretStore};
use crate::util::lock;

/// One cached item. The value is absent until the first successful read.
#[derive(Debug, Clone)]
pub struct SecretRecord {
    pub metadata: Metadata,
    pub fields: ContentFields,
    value: Option<Zeroizing<String>>,
}

impl SecretRecord {
    /// Metadata-only record from a listing entry.
    pub fn from_listing(entry: &RemoteMetadata) -> Self {
        let (item_type, fields) = decode_tag(entry.content_tag.as_deref());
        Self {
            metadata: Metadata {
                name: entry.name.clone(),
                item_type,
                created: entry.created,
                modified: entry.modified,
                favicon: None,
            },
            fields,
            value: None,
        }
    }

    /// Fully-present record from a remote read.
    pub fn from_remote(secret: RemoteSecret) -> Self {
        let mut record = Self::from_listing(&secret.metadata());
        record.value = Some(secret.value);
        record
    }

    /// Fully-present record for an item that was just written.
    pub fn from_item(item: &Item) -> Self {
        Self {
            metadata: item.metadata().clone(),
            fields: item.content_fields(),
            value: Some(Zeroizing::new(item.secret_value().to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().map(String::as_str)
    }

    /// The full item, if the value has been fetched.
    pub fn to_item(&self) -> Option<Item> {
        self.value().map(|v| {
            Item::assemble(self.metadata.clone(), self.fields.clone(), v.to_string())
        })
    }
}

/// Selection for `search` and `list_metadata`.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Case-sensitive substring of the name; empty matches everything.
    pub name: String,
    /// Accepted item types; empty accepts every type.
    pub types: Vec<ItemType>,
}

impl ItemFilter {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
        }
    }

    pub fn by_types(types: &[ItemType]) -> Self {
        Self {
            name: String::new(),
            types: types.to_vec(),
        }
    }

    fn matches(&self, meta: &Metadata) -> bool {
        (self.name.is_empty() || meta.name.contains(&self.name))
            && (self.types.is_empty() || self.types.contains(&meta.item_type))
    }
}

/// Process-lifetime cache of one vault's secrets.
#[derive(Debug)]
pub struct SecretCache {
    store: Arc<dyn RemoteSecretStore>,
    entries: Mutex<HashMap<String, SecretRecord>>,
    /// Bumped under the `entries` lock by every delete.
    deletions: AtomicU64,
}

impl SecretCache {
    pub fn new(store: Arc<dyn RemoteSecretStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
            deletions: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn RemoteSecretStore> {
        &self.store
    }

    /// Bulk-insert listing entries as metadata-only records.
    ///
    /// Records that already hold a value are left alone.
    pub fn insert_metadata<I>(&self, listing: I)
    where
        I: IntoIterator<Item = RemoteMetadata>,
    {
        let mut entries = lock(&self.entries);
        for entry in listing {
            if entries.get(&entry.name).is_some_and(SecretRecord::is_present) {
                continue;
            }
            entries.insert(entry.name.clone(), SecretRecord::from_listing(&entry));
        }
    }

    /// Cached metadata matching `filter`, sorted by name. Never touches
    /// the remote store.
    pub fn search(&self, filter: &ItemFilter) -> Vec<Metadata> {
        let mut found: Vec<Metadata> = lock(&self.entries)
            .values()
            .filter(|r| filter.matches(&r.metadata))
            .map(|r| r.metadata.clone())
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Metadata for exactly `name`, fetching it from the store when the
    /// cache does not know it yet.
    pub async fn get_exact(&self, name: &str) -> Result<Metadata> {
        Ok(self.get(name).await?.metadata)
    }

    /// Search, and when nothing matches a non-empty name, fall back to a
    /// point read of that name as an exact key.
    pub async fn list_metadata(&self, filter: &ItemFilter) -> Vec<Metadata> {
        let found = self.search(filter);
        if !found.is_empty() || filter.name.is_empty() {
            return found;
        }
        match self.get_exact(&filter.name).await {
            Ok(meta) => vec![meta],
            Err(e) => {
                debug!(name = %filter.name, error = %e, "point read found nothing");
                Vec::new()
            }
        }
    }

    /// The record for `name`, with its value.
    ///
    /// Served from memory when the value is already cached, otherwise
    /// read once from the store and cached.
    pub async fn get(&self, name: &str) -> Result<SecretRecord> {
        let cached = lock(&self.entries)
            .get(name)
            .filter(|r| r.is_present())
            .cloned();
        if let Some(record) = cached {
            return Ok(record);
        }

        debug!(name, "fetching secret value");
        let deletions = self.deletions.load(Ordering::Acquire);
        let secret = self.store.get(name).await.map_err(|e| match e {
            PawError::SecretNotFound(_) | PawError::RemoteUnavailable(_) => e,
            other => PawError::RemoteUnavailable(other.to_string()),
        })?;

        let mut entries = lock(&self.entries);
        let record = match entries.get_mut(name) {
            // Someone stored or fetched it while we were waiting.
            Some(existing) if existing.is_present() => existing.clone(),
            Some(existing) => {
                let favicon = existing.metadata.favicon.take();
                let mut fetched = SecretRecord::from_remote(secret);
                fetched.metadata.favicon = favicon;
                *existing = fetched.clone();
                fetched
            }
            None => {
                let fetched = SecretRecord::from_remote(secret);
                // A delete ran while we were reading: do not bring it back.
                if self.deletions.load(Ordering::Acquire) == deletions {
                    entries.insert(name.to_string(), fetched.clone());
                }
                fetched
            }
        };
        Ok(record)
    }

    /// The full item for `name`.
    pub async fn get_item(&self, name: &str) -> Result<Item> {
        let record = self.get(name).await?;
        record
            .to_item()
            .ok_or_else(|| PawError::SecretNotFound(name.to_string()))
    }

    /// Write `item` to the store, then cache it with the store's stamps.
    ///
    /// Returns the item as cached. Oversized content is rejected before
    /// any remote call and leaves the cache untouched.
    pub async fn put(&self, item: &Item) -> Result<Item> {
        let name = item.name();
        validate_secret_name(name)?;
        let fields = item.content_fields();
        fields.validate(name)?;
        let tag = encode_tag(item.item_type(), &fields);

        let stamps = self
            .store
            .set(name, item.secret_value(), &tag)
            .await
            .map_err(|e| match e {
                PawError::PayloadTooLarge(len) => PawError::RemoteWriteRejected {
                    name: name.to_string(),
                    reason: format!("content tag of {len} characters is too large"),
                },
                other => other,
            })?;

        let mut stored = item.clone();
        let meta = stored.metadata_mut();
        meta.created = stamps.created;
        meta.modified = stamps.modified;

        lock(&self.entries).insert(name.to_string(), SecretRecord::from_item(&stored));
        debug!(name, "stored secret");
        Ok(stored)
    }

    /// Delete remotely, then drop the cached record. A failed remote
    /// delete leaves the cache as it was.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.store.delete(name).await?;
        let mut entries = lock(&self.entries);
        entries.remove(name);
        self.deletions.fetch_add(1, Ordering::AcqRel);
        drop(entries);
        debug!(name, "deleted secret");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.entries).contains_key(name)
    }

    /// Cached metadata for `name`, without any remote call.
    pub fn metadata(&self, name: &str) -> Option<Metadata> {
        lock(&self.entries).get(name).map(|r| r.metadata.clone())
    }

    /// Whether the value for `name` is already cached.
    pub fn is_present(&self, name: &str) -> bool {
        lock(&self.entries)
            .get(name)
            .is_some_and(SecretRecord::is_present)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_by_type(&self, item_type: ItemType) -> usize {
        lock(&self.entries)
            .values()
            .filter(|r| r.metadata.item_type == item_type)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn cache_with(store: &Arc<MemoryStore>) -> SecretCache {
        SecretCache::new(Arc::clone(store) as Arc<dyn RemoteSecretStore>)
    }

    #[tokio::test]
    async fn search_filters_by_substring_and_type() {
        let store = Arc::new(MemoryStore::new());
        store.insert("gmail", "p", Some("login|a||"));
        store.insert("gitlab", "p", Some("website|a|gitlab.com|"));
        store.insert("recipes", "x", Some("note|||"));
        let cache = cache_with(&store);
        cache.insert_metadata(store.list_all().await.unwrap());

        let names = |v: Vec<Metadata>| v.into_iter().map(|m| m.name).collect::<Vec<_>>();
        assert_eq!(names(cache.search(&ItemFilter::by_name("g"))), ["gitlab", "gmail"]);
        assert_eq!(
            names(cache.search(&ItemFilter::by_types(&[ItemType::Note]))),
            ["recipes"]
        );
        assert!(cache.search(&ItemFilter::by_name("G")).is_empty());
        assert_eq!(cache.count_by_type(ItemType::Login), 1);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn list_metadata_falls_back_to_point_read() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(&store);
        // Written by someone else after the session listed the vault.
        store.insert("late-arrival", "v", Some("password|||"));

        assert!(cache.search(&ItemFilter::by_name("late-arrival")).is_empty());
        let found = cache
            .list_metadata(&ItemFilter::by_name("late-arrival"))
            .await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].item_type, ItemType::Password);
        assert!(cache.is_present("late-arrival"));

        assert!(cache.list_metadata(&ItemFilter::by_name("ghost")).await.is_empty());
    }

    #[tokio::test]
    async fn get_upgrades_metadata_only_record() {
        let store = Arc::new(MemoryStore::new());
        store.insert("gmail", "p1", Some("login|alice|mail.example|hi"));
        let cache = cache_with(&store);
        cache.insert_metadata(store.list_all().await.unwrap());
        assert!(!cache.is_present("gmail"));

        let item = cache.get_item("gmail").await.unwrap();
        match item {
            Item::Login(login) => {
                assert_eq!(login.username, "alice");
                assert_eq!(login.password, "p1");
                assert_eq!(login.note, "hi");
            }
            other => panic!("expected login, got {other:?}"),
        }
        assert!(cache.is_present("gmail"));
    }

    #[tokio::test]
    async fn relisting_does_not_downgrade_present_records() {
        let store = Arc::new(MemoryStore::new());
        store.insert("gmail", "p1", None);
        let cache = cache_with(&store);
        cache.get("gmail").await.unwrap();

        cache.insert_metadata(store.list_all().await.unwrap());
        assert!(cache.is_present("gmail"));
    }

    #[tokio::test]
    async fn unavailable_store_surfaces_on_get() {
        let store = Arc::new(MemoryStore::new());
        store.insert("gmail", "p1", None);
        store.set_unavailable(true);
        let cache = cache_with(&store);
        assert!(matches!(
            cache.get("gmail").await,
            Err(PawError::RemoteUnavailable(_))
        ));
        assert!(!cache.contains("gmail"));
    }

    #[tokio::test]
    async fn failed_delete_keeps_cache_entry() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(&store);
        cache.put(&Item::note("n1", "x")).await.unwrap();
        store.fail_delete_for("n1");

        assert!(cache.delete("n1").await.is_err());
        assert!(cache.contains("n1"));
        assert!(store.contains("n1"));
    }

    #[tokio::test]
    async fn full_content_budget_is_accepted() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(&store);
        // Each joins to exactly 255 characters of "username|url|note".
        let items = [
            (ItemType::Login, "fits", ContentFields::new("a", "", &"n".repeat(252))),
            (ItemType::Website, "fits-site", ContentFields::new("a", "", &"n".repeat(252))),
            (ItemType::Password, "fits-pin", ContentFields::new("", "", &"n".repeat(253))),
        ];
        for (item_type, name, fields) in items {
            assert_eq!(fields.joined().chars().count(), 255);
            let item = Item::assemble(Metadata::new(name, item_type), fields.clone(), "pw".into());

            let stored = cache.put(&item).await.unwrap();
            assert_eq!(stored.content_fields(), fields);
            assert!(store.contains(name));
        }

        let over = Item::assemble(
            Metadata::new("over", ItemType::Login),
            ContentFields::new("ab", "", &"n".repeat(252)),
            "pw".into(),
        );
        assert!(matches!(
            cache.put(&over).await,
            Err(PawError::RemoteWriteRejected { .. })
        ));
        assert!(!cache.contains("over"));
    }

    /// Store whose reads pause after fetching, until released.
    #[derive(Debug, Default)]
    struct GatedStore {
        inner: MemoryStore,
        fetched: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl RemoteSecretStore for GatedStore {
        async fn list_page(&self, marker: Option<String>) -> Result<crate::store::SecretPage> {
            self.inner.list_page(marker).await
        }

        async fn get(&self, name: &str) -> Result<RemoteSecret> {
            let secret = self.inner.get(name).await;
            self.fetched.notify_one();
            self.release.notified().await;
            secret
        }

        async fn set(&self, name: &str, value: &str, tag: &str) -> Result<crate::store::Stamps> {
            self.inner.set(name, value, tag).await
        }

        async fn delete(&self, name: &str) -> Result<()> {
            self.inner.delete(name).await
        }
    }

    #[tokio::test]
    async fn read_racing_a_delete_does_not_resurrect() {
        let store = Arc::new(GatedStore::default());
        store.inner.insert("db", "v", None);
        let cache = Arc::new(SecretCache::new(
            Arc::clone(&store) as Arc<dyn RemoteSecretStore>
        ));

        let reader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("db").await })
        };
        // The value is read; the delete lands before the reader caches it.
        store.fetched.notified().await;
        cache.delete("db").await.unwrap();
        store.release.notify_one();

        assert_eq!(reader.await.unwrap().unwrap().value(), Some("v"));
        assert!(!cache.contains("db"));
        assert!(!store.inner.contains("db"));
    }

    #[tokio::test]
    async fn put_copies_remote_stamps() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(&store);
        let mut item = Item::login("gmail", "a", "", "p1");
        item.metadata_mut().created = chrono::DateTime::UNIX_EPOCH;

        let stored = cache.put(&item).await.unwrap();
        assert!(stored.metadata().created > chrono::DateTime::UNIX_EPOCH);
        assert_eq!(cache.metadata("gmail").unwrap(), *stored.metadata());
    }
}
