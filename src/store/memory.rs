//! In-process secret store.
//!
//! Behaves like the remote service (paged listing, server-stamped
//! timestamps, tag length limit) and counts every call, which makes it
//! the backend the cache and workflow tests are written against. Faults
//! and latency can be injected per secret name.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::{PawError, Result};
use crate::util::lock;

use super::{
    check_tag_len, RemoteMetadata, RemoteSecret, RemoteSecretStore, SecretPage, Stamps, PAGE_SIZE,
};

/// A secret as the store keeps it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredSecret {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_tag: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// Name-ordered table shared by the in-memory and directory stores.
pub(crate) type SecretTable = BTreeMap<String, StoredSecret>;

pub(crate) fn table_page(table: &SecretTable, marker: Option<&str>) -> SecretPage {
    let start = match marker {
        Some(m) => std::ops::Bound::Excluded(m.to_string()),
        None => std::ops::Bound::Unbounded,
    };
    let mut iter = table.range((start, std::ops::Bound::Unbounded));
    let items: Vec<RemoteMetadata> = iter
        .by_ref()
        .take(PAGE_SIZE)
        .map(|(name, s)| RemoteMetadata {
            name: name.clone(),
            content_tag: s.content_tag.clone(),
            created: s.created,
            modified: s.modified,
        })
        .collect();
    let next_marker = match iter.next() {
        Some(_) => items.last().map(|m| m.name.clone()),
        None => None,
    };
    SecretPage { items, next_marker }
}

pub(crate) fn table_get(table: &SecretTable, name: &str) -> Result<RemoteSecret> {
    let s = table
        .get(name)
        .ok_or_else(|| PawError::SecretNotFound(name.to_string()))?;
    Ok(RemoteSecret {
        name: name.to_string(),
        value: Zeroizing::new(s.value.clone()),
        content_tag: s.content_tag.clone(),
        created: s.created,
        modified: s.modified,
    })
}

pub(crate) fn table_set(table: &mut SecretTable, name: &str, value: &str, tag: &str) -> Stamps {
    let now = Utc::now();
    // Overwrites keep the original creation time.
    let created = table.get(name).map_or(now, |existing| existing.created);
    table.insert(
        name.to_string(),
        StoredSecret {
            value: value.to_string(),
            content_tag: Some(tag.to_string()),
            created,
            modified: now,
        },
    );
    Stamps {
        created,
        modified: now,
    }
}

/// Per-operation call counters.
#[derive(Debug, Default)]
struct CallCounters {
    list: AtomicUsize,
    get: AtomicUsize,
    set: AtomicUsize,
    delete: AtomicUsize,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    List,
    Get,
    Set,
    Delete,
}

#[derive(Debug, Default)]
struct Faults {
    unavailable: bool,
    fail_get: HashSet<String>,
    fail_set: HashSet<String>,
    fail_delete: HashSet<String>,
    latency_ms: Option<(u64, u64)>,
}

/// Secret store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    secrets: Mutex<SecretTable>,
    calls: CallCounters,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a secret directly, bypassing call counters and faults.
    pub fn insert(&self, name: &str, value: &str, content_tag: Option<&str>) {
        let now = Utc::now();
        lock(&self.secrets).insert(
            name.to_string(),
            StoredSecret {
                value: value.to_string(),
                content_tag: content_tag.map(str::to_string),
                created: now,
                modified: now,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.secrets).contains_key(name)
    }

    /// Stored value for `name`, without counting as a `get` call.
    pub fn value_of(&self, name: &str) -> Option<String> {
        lock(&self.secrets).get(name).map(|s| s.value.clone())
    }

    /// Every stored secret name, sorted.
    pub fn names(&self) -> Vec<String> {
        lock(&self.secrets).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.secrets).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list_calls(&self) -> usize {
        self.calls.list.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.calls.get.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.calls.set.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.calls.delete.load(Ordering::SeqCst)
    }

    /// Make every call fail with `RemoteUnavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.faults).unavailable = unavailable;
    }

    pub fn fail_get_for(&self, name: &str) {
        lock(&self.faults).fail_get.insert(name.to_string());
    }

    pub fn fail_set_for(&self, name: &str) {
        lock(&self.faults).fail_set.insert(name.to_string());
    }

    pub fn fail_delete_for(&self, name: &str) {
        lock(&self.faults).fail_delete.insert(name.to_string());
    }

    /// Delay every call by a random duration in `[min, max]`.
    pub fn set_latency(&self, min: Duration, max: Duration) {
        let min_ms = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX).max(min_ms);
        lock(&self.faults).latency_ms = Some((min_ms, max_ms));
    }

    async fn simulate(&self, op: Op, name: Option<&str>) -> Result<()> {
        let (latency, failing) = {
            let faults = lock(&self.faults);
            let latency = faults.latency_ms.map(|(lo, hi)| {
                let mut rng = rand::rng();
                Duration::from_millis(rng.random_range(lo..=hi))
            });
            let targeted = match (op, name) {
                (Op::Get, Some(n)) => faults.fail_get.contains(n),
                (Op::Set, Some(n)) => faults.fail_set.contains(n),
                (Op::Delete, Some(n)) => faults.fail_delete.contains(n),
                _ => false,
            };
            (latency, faults.unavailable || targeted)
        };

        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(PawError::RemoteUnavailable(format!(
                "injected failure for '{}'",
                name.unwrap_or("*")
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSecretStore for MemoryStore {
    async fn list_page(&self, marker: Option<String>) -> Result<SecretPage> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        self.simulate(Op::List, None).await?;
        Ok(table_page(&lock(&self.secrets), marker.as_deref()))
    }

    async fn get(&self, name: &str) -> Result<RemoteSecret> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        self.simulate(Op::Get, Some(name)).await?;
        table_get(&lock(&self.secrets), name)
    }

    async fn set(&self, name: &str, value: &str, content_tag: &str) -> Result<Stamps> {
        self.calls.set.fetch_add(1, Ordering::SeqCst);
        check_tag_len(content_tag)?;
        self.simulate(Op::Set, Some(name)).await?;
        Ok(table_set(&mut lock(&self.secrets), name, value, content_tag))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.simulate(Op::Delete, Some(name)).await?;
        lock(&self.secrets)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PawError::SecretNotFound(name.to_string()))
    }
}
