//! Remote secret store interface and implementations.
//!
//! The core only ever talks to a `RemoteSecretStore`. Concrete backends:
//! - `MemoryStore`: in-process, with call counters and fault injection
//! - `LocalDirStore`: a directory standing in for the remote service
//! - `RetryingStore`: per-call timeout and bounded retries around any store

pub mod local;
pub mod memory;
pub mod retry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use crate::errors::{PawError, Result};

pub use local::LocalDirStore;
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, RetryingStore};

/// Items per listing page.
pub const PAGE_SIZE: usize = 25;

/// Maximum length of a content tag the store accepts: the 255-character
/// `username|url|note` budget plus the `<type>|` prefix.
pub const MAX_TAG_LEN: usize = crate::item::content::MAX_ENCODED_TAG_LEN;

/// Listing entry: everything about a secret except its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMetadata {
    pub name: String,
    pub content_tag: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// A secret read from the store, value included.
#[derive(Debug, Clone)]
pub struct RemoteSecret {
    pub name: String,
    pub value: Zeroizing<String>,
    pub content_tag: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl RemoteSecret {
    pub fn metadata(&self) -> RemoteMetadata {
        RemoteMetadata {
            name: self.name.clone(),
            content_tag: self.content_tag.clone(),
            created: self.created,
            modified: self.modified,
        }
    }
}

/// Timestamps the store assigns on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamps {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// One page of a listing. `next_marker` is `None` on the last page.
#[derive(Debug, Clone, Default)]
pub struct SecretPage {
    pub items: Vec<RemoteMetadata>,
    pub next_marker: Option<String>,
}

/// The remote source of truth for a vault.
///
/// Implementations must be Send + Sync: one client is shared by every
/// worker task of a bulk job.
#[async_trait]
pub trait RemoteSecretStore: Send + Sync + std::fmt::Debug {
    /// Fetch one page of secret metadata starting after `marker`.
    async fn list_page(&self, marker: Option<String>) -> Result<SecretPage>;

    /// Read a secret and its value.
    async fn get(&self, name: &str) -> Result<RemoteSecret>;

    /// Create or overwrite a secret. Fails with `PayloadTooLarge` if the
    /// content tag is longer than the store accepts.
    async fn set(&self, name: &str, value: &str, content_tag: &str) -> Result<Stamps>;

    /// Delete a secret.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Walk every page and return the flattened listing.
    async fn list_all(&self) -> Result<Vec<RemoteMetadata>> {
        let mut all = Vec::new();
        let mut marker = None;
        loop {
            let page = self.list_page(marker).await?;
            all.extend(page.items);
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => return Ok(all),
            }
        }
    }
}

/// Reject tags the store would not accept.
pub fn check_tag_len(content_tag: &str) -> Result<()> {
    let len = content_tag.chars().count();
    if len > MAX_TAG_LEN {
        return Err(PawError::PayloadTooLarge(len));
    }
    Ok(())
}
