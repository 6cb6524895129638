//! Local JSON archives of vault items.
//!
//! An archive is a JSON object keyed by item type name, each key holding
//! the ordered list of items of that type:
//!
//! ```json
//! { "login": [ { "metadata": { "name": "gmail", "type": "login", ... }, "username": "a", ... } ],
//!   "note":  [ { "metadata": { "name": "n1", "type": "note", ... }, "body": "x" } ] }
//! ```
//!
//! Export writes one, import reads one. Groups are written in type-name
//! order so two exports of the same vault are byte-identical.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{PawError, Result};
use crate::item::{Item, ItemType};
use crate::store::local::write_atomic;

/// Items grouped by type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    groups: BTreeMap<ItemType, Vec<Item>>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group `items` by type, keeping their relative order.
    pub fn from_items<I: IntoIterator<Item = Item>>(items: I) -> Self {
        let mut archive = Self::new();
        for item in items {
            archive.push(item);
        }
        archive
    }

    pub fn from_groups(groups: BTreeMap<ItemType, Vec<Item>>) -> Self {
        Self { groups }
    }

    pub fn push(&mut self, item: Item) {
        self.groups.entry(item.item_type()).or_default().push(item);
    }

    pub fn group(&self, item_type: ItemType) -> &[Item] {
        self.groups.get(&item_type).map_or(&[], Vec::as_slice)
    }

    /// Every item, group by group.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.groups.values().flatten()
    }

    pub fn into_items(self) -> Vec<Item> {
        self.groups.into_values().flatten().collect()
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check every item sits in the group for its type and names are
    /// unique across the archive.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (group, items) in &self.groups {
            for item in items {
                if item.item_type() != *group || item.metadata().item_type != *group {
                    return Err(PawError::Archive(format!(
                        "item '{}' of type {} found under '{group}'",
                        item.name(),
                        item.metadata().item_type
                    )));
                }
                if !seen.insert(item.name()) {
                    return Err(PawError::Archive(format!(
                        "duplicate item name '{}'",
                        item.name()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        let mut root = Map::new();
        for (item_type, items) in &self.groups {
            let list = serde_json::to_value(items)
                .map_err(|e| PawError::SerializationError(format!("archive: {e}")))?;
            root.insert(item_type.as_str().to_string(), list);
        }
        serde_json::to_string_pretty(&Value::Object(root))
            .map_err(|e| PawError::SerializationError(format!("archive: {e}")))
    }

    /// Parse and validate an archive document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let root: Map<String, Value> = serde_json::from_str(raw)
            .map_err(|e| PawError::Archive(format!("not a JSON object of item groups: {e}")))?;

        let mut groups = BTreeMap::new();
        for (key, list) in root {
            let item_type: ItemType = key
                .parse()
                .map_err(|_| PawError::Archive(format!("unknown item type '{key}'")))?;
            let Value::Array(entries) = list else {
                return Err(PawError::Archive(format!("group '{key}' is not a list")));
            };
            let items = entries
                .into_iter()
                .enumerate()
                .map(|(idx, entry)| {
                    Item::from_json_value(item_type, entry).map_err(|e| {
                        PawError::Archive(format!("{key}[{idx}]: {e}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            groups.insert(item_type, items);
        }

        let archive = Self { groups };
        archive.validate()?;
        Ok(archive)
    }
}

/// Where archives are loaded from and stored to.
#[async_trait]
pub trait LocalArchive: Send + Sync {
    async fn load(&self) -> Result<Archive>;
    async fn store(&self, archive: &Archive) -> Result<()>;
}

/// Archive kept as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileArchive {
    path: PathBuf,
}

impl JsonFileArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LocalArchive for JsonFileArchive {
    async fn load(&self) -> Result<Archive> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PawError::Archive(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let archive = Archive::from_json(&raw)?;
        debug!(path = %self.path.display(), items = archive.len(), "loaded archive");
        Ok(archive)
    }

    async fn store(&self, archive: &Archive) -> Result<()> {
        let json = archive.to_json()?;
        write_atomic(&self.path, json.as_bytes()).await?;
        debug!(path = %self.path.display(), items = archive.len(), "wrote archive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Archive {
        Archive::from_items([
            Item::note("n1", "x"),
            Item::login("gmail", "a", "", "p1"),
            Item::login("bank", "b", "bank.example", "p2"),
        ])
    }

    #[test]
    fn groups_by_type_name_in_order() {
        let json = sample().to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["login", "note"]);
        assert_eq!(value["login"][0]["metadata"]["name"], "gmail");
        assert_eq!(value["login"][1]["metadata"]["name"], "bank");
        assert_eq!(value["note"][0]["body"], "x");
    }

    #[test]
    fn parses_what_it_writes() {
        let archive = sample();
        let back = Archive::from_json(&archive.to_json().unwrap()).unwrap();
        assert_eq!(back, archive);
        assert_eq!(back.group(ItemType::Login).len(), 2);
        assert!(back.group(ItemType::Website).is_empty());
    }

    #[test]
    fn rejects_mismatched_group() {
        let raw = r#"{"note": [{"metadata": {"name": "x", "type": "login",
            "created": "2024-01-01T00:00:00Z", "modified": "2024-01-01T00:00:00Z"},
            "body": "b"}]}"#;
        let err = Archive::from_json(raw).unwrap_err();
        assert!(err.to_string().contains("found under 'note'"));
    }

    #[test]
    fn rejects_duplicates_and_unknown_groups() {
        let mut archive = sample();
        archive.push(Item::note("gmail", "dup"));
        assert!(matches!(archive.validate(), Err(PawError::Archive(_))));

        assert!(Archive::from_json(r#"{"card": []}"#).is_err());
        assert!(Archive::from_json(r#"{"login": {}}"#).is_err());
        assert!(Archive::from_json("[]").is_err());
    }

    #[tokio::test]
    async fn file_archive_round_trip() {
        let dir = TempDir::new().unwrap();
        let file = JsonFileArchive::new(dir.path().join("out").join("vault.json"));
        let archive = sample();
        file.store(&archive).await.unwrap();
        assert!(file.path().exists());
        assert_eq!(file.load().await.unwrap(), archive);
    }
}
