//! Item module: the entities exchanged between cache, store and bulk jobs.
//!
//! This module provides:
//! - `ItemType`, `Metadata` and `Favicon` (`metadata`)
//! - The tagged `Item` variant and its kinds (`kinds`)
//! - The remote content tag codec (`content`)
//! - Secret and vault name rules (`names`)

pub mod content;
pub mod kinds;
pub mod metadata;
pub mod names;

// Re-export the most commonly used items.
pub use content::{ContentFields, CONTENT_BUDGET};
pub use kinds::{Item, Login, Note, Password, Website};
pub use metadata::{Favicon, ItemType, Metadata};
pub use names::{validate_secret_name, validate_vault_name};
