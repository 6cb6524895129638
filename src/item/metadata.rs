//! Metadata shared by every item kind.
//!
//! `Metadata` is the non-secret half of an item: its unique name, its
//! type tag, the remote-stamped timestamps, and an optional favicon.
//! The favicon bytes serialize as base64 in JSON.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PawError;

/// The closed set of item kinds a vault can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Login,
    Note,
    Password,
    Website,
}

impl ItemType {
    /// Every item type, in display order.
    pub const ALL: [ItemType; 4] = [
        ItemType::Login,
        ItemType::Note,
        ItemType::Password,
        ItemType::Website,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Note => "note",
            Self::Password => "password",
            Self::Website => "website",
        }
    }
}

impl FromStr for ItemType {
    type Err = PawError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "note" => Ok(Self::Note),
            "password" => Ok(Self::Password),
            "website" => Ok(Self::Website),
            other => Err(PawError::CommandFailed(format!(
                "unknown item type '{other}' (expected login, note, password or website)"
            ))),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A site icon attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favicon {
    /// Host the icon was fetched for (e.g. "example.com").
    pub host: String,

    /// Icon image bytes, base64 in JSON.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub data: Vec<u8>,
}

/// Identifies one vault item.
///
/// `name` is the key both in the cache and in the remote store. Renaming
/// is modeled as delete + insert, so `name` is never mutated in place
/// once an item is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,

    #[serde(rename = "type")]
    pub item_type: ItemType,

    pub created: DateTime<Utc>,

    pub modified: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<Favicon>,
}

impl Metadata {
    /// Fresh metadata stamped with the current time.
    pub fn new(name: impl Into<String>, item_type: ItemType) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            item_type,
            created: now,
            modified: now,
            favicon: None,
        }
    }
}

fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}
