//! Breach checking for stored credentials.
//!
//! `CorpusBreachChecker` answers from a local corpus file with one
//! `SHA256-HEX:COUNT` entry per line, the same shape as downloadable
//! password-hash dumps. Passwords are hashed before lookup and the
//! corpus never holds plaintext.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{PawError, Result};
use crate::item::Item;

/// Outcome of checking one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BreachStatus {
    pub found: bool,
    pub count: u64,
}

impl BreachStatus {
    pub fn clean() -> Self {
        Self::default()
    }

    /// Found with at least one occurrence.
    pub fn is_breached(&self) -> bool {
        self.found && self.count > 0
    }
}

/// Reports whether an item's password appears in a breach corpus.
#[async_trait]
pub trait BreachChecker: Send + Sync + std::fmt::Debug {
    async fn check(&self, item: &Item) -> Result<BreachStatus>;
}

/// Breach checker over an in-memory hash corpus.
#[derive(Debug, Default, Clone)]
pub struct CorpusBreachChecker {
    counts: HashMap<String, u64>,
}

impl CorpusBreachChecker {
    /// Load a corpus file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PawError::ConfigError(format!("cannot read breach corpus {}: {e}", path.display()))
        })?;
        let checker: Self = raw.parse()?;
        debug!(path = %path.display(), hashes = checker.len(), "loaded breach corpus");
        Ok(checker)
    }

    /// Build a corpus from plaintext passwords. Meant for tests and
    /// small ad-hoc corpora.
    pub fn from_passwords<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let counts = entries
            .into_iter()
            .map(|(password, count)| (hash_password(password), count))
            .collect();
        Self { counts }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn lookup(&self, password: &str) -> BreachStatus {
        match self.counts.get(&hash_password(password)) {
            Some(&count) => BreachStatus { found: true, count },
            None => BreachStatus::clean(),
        }
    }
}

impl std::str::FromStr for CorpusBreachChecker {
    type Err = PawError;

    /// Parse `HASH:COUNT` lines. Blank lines and `#` comments are skipped.
    fn from_str(s: &str) -> Result<Self> {
        let mut counts = HashMap::new();
        for (idx, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (hash, count) = line.split_once(':').ok_or_else(|| {
                PawError::ConfigError(format!("breach corpus line {}: missing ':'", idx + 1))
            })?;
            let digest = hex::decode(hash.trim())
                .ok()
                .filter(|bytes| bytes.len() == 32)
                .ok_or_else(|| {
                    PawError::ConfigError(format!(
                        "breach corpus line {}: not a SHA-256 hex digest",
                        idx + 1
                    ))
                })?;
            let count: u64 = count.trim().parse().map_err(|_| {
                PawError::ConfigError(format!("breach corpus line {}: bad count", idx + 1))
            })?;
            counts.insert(hex::encode(digest), count);
        }
        Ok(Self { counts })
    }
}

#[async_trait]
impl BreachChecker for CorpusBreachChecker {
    async fn check(&self, item: &Item) -> Result<BreachStatus> {
        Ok(match item.password() {
            Some(password) => self.lookup(password),
            None => BreachStatus::clean(),
        })
    }
}

/// Lowercase hex SHA-256 of a password.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
