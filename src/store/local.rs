//! Directory-backed secret store.
//!
//! Stands in for the remote service on a single machine: every vault is
//! one JSON document at `<root>/<vault>.secrets.json`, rewritten
//! atomically (temp file + rename) after each mutation. Values are kept
//! as the store receives them; encryption at rest is the caller's
//! concern.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{PawError, Result};

use super::memory::{table_get, table_page, table_set, SecretTable};
use super::{check_tag_len, RemoteSecret, RemoteSecretStore, SecretPage, Stamps};

/// Store rooted at a directory on disk.
#[derive(Debug)]
pub struct LocalDirStore {
    /// Path to the vault's JSON document.
    path: PathBuf,

    /// Working copy of the document, flushed after every write.
    table: Mutex<SecretTable>,
}

impl LocalDirStore {
    /// Open (or start) the store for `vault` under `root`.
    ///
    /// A missing document is an empty vault. The directory is created on
    /// first write.
    pub fn open(root: &Path, vault: &str) -> Result<Self> {
        let path = root.join(format!("{vault}.secrets.json"));
        let table = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|e| {
                PawError::SerializationError(format!("{}: {e}", path.display()))
            })?
        } else {
            SecretTable::new()
        };
        debug!(path = %path.display(), secrets = table.len(), "opened local store");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, table: &SecretTable) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(table)
            .map_err(|e| PawError::SerializationError(format!("secrets: {e}")))?;
        write_atomic(&self.path, &bytes).await
    }
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    tokio::fs::create_dir_all(parent).await?;
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));
    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[async_trait]
impl RemoteSecretStore for LocalDirStore {
    async fn list_page(&self, marker: Option<String>) -> Result<SecretPage> {
        let table = self.table.lock().await;
        Ok(table_page(&table, marker.as_deref()))
    }

    async fn get(&self, name: &str) -> Result<RemoteSecret> {
        let table = self.table.lock().await;
        table_get(&table, name)
    }

    async fn set(&self, name: &str, value: &str, content_tag: &str) -> Result<Stamps> {
        check_tag_len(content_tag)?;
        let mut table = self.table.lock().await;
        let previous = table.get(name).cloned();
        let stamps = table_set(&mut table, name, value, content_tag);
        if let Err(e) = self.flush(&table).await {
            // Keep the working copy in line with what is on disk.
            match previous {
                Some(prev) => table.insert(name.to_string(), prev),
                None => table.remove(name),
            };
            return Err(PawError::RemoteUnavailable(format!("write failed: {e}")));
        }
        Ok(stamps)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut table = self.table.lock().await;
        let removed = table
            .remove(name)
            .ok_or_else(|| PawError::SecretNotFound(name.to_string()))?;
        if let Err(e) = self.flush(&table).await {
            table.insert(name.to_string(), removed);
            return Err(PawError::RemoteUnavailable(format!("write failed: {e}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let store = LocalDirStore::open(dir.path(), "team").unwrap();
        store.set("gmail", "p1", "login|a||").await.unwrap();
        store.set("bank", "p2", "login|b||").await.unwrap();
        store.delete("bank").await.unwrap();

        let reopened = LocalDirStore::open(dir.path(), "team").unwrap();
        let all = reopened.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "gmail");
        assert_eq!(all[0].content_tag.as_deref(), Some("login|a||"));
        assert_eq!(reopened.get("gmail").await.unwrap().value.as_str(), "p1");
    }

    #[tokio::test]
    async fn missing_document_is_empty_vault() {
        let dir = TempDir::new().unwrap();
        let store = LocalDirStore::open(dir.path(), "fresh").unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(!store.path().exists());
        assert!(matches!(
            store.get("nope").await,
            Err(PawError::SecretNotFound(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_document_fails_to_open() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.secrets.json"), "{not json").unwrap();
        assert!(LocalDirStore::open(dir.path(), "bad").is_err());
    }
}
