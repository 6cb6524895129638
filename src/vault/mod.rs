//! Vault module: an open vault and its item index.
//!
//! This module provides:
//! - `VaultIndex` and the snapshot persisters (`index`)
//! - `VaultSession`, which owns the cache and index of one vault (`session`)

pub mod index;
pub mod session;

// Re-export the most commonly used items.
pub use index::{FileIndexPersister, IndexPersister, MemoryIndexPersister, VaultIndex};
pub use session::VaultSession;
