//! Content tag codec.
//!
//! The remote store keeps only a name, a secret value and a short
//! content tag per secret. Everything non-secret that is not metadata
//! travels in the tag as `<type>|<username>|<url>|<note>`.
//!
//! The store budget is 255 characters for the `username|url|note`
//! portion; the `<type>|` prefix is carried on top of it. The note comes
//! last so it may itself contain `|`.

use crate::errors::{PawError, Result};

use super::metadata::ItemType;

/// Maximum characters of `username|url|note` the remote store accepts.
pub const CONTENT_BUDGET: usize = 255;

/// Longest content tag `encode_tag` produces for fields within budget.
pub const MAX_ENCODED_TAG_LEN: usize = CONTENT_BUDGET + longest_type_prefix();

const SEPARATOR: char = '|';

const fn longest_type_prefix() -> usize {
    let mut longest = 0;
    let mut i = 0;
    while i < ItemType::ALL.len() {
        let len = ItemType::ALL[i].as_str().len() + 1;
        if len > longest {
            longest = len;
        }
        i += 1;
    }
    longest
}

/// Non-secret item fields carried in the content tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFields {
    pub username: String,
    pub url: String,
    pub note: String,
}

impl ContentFields {
    pub fn new(username: &str, url: &str, note: &str) -> Self {
        Self {
            username: username.to_string(),
            url: url.to_string(),
            note: note.to_string(),
        }
    }

    /// `username|url|note`, the part of the tag counted against the budget.
    pub fn joined(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.username, self.url, self.note
        )
    }

    /// Check the fields fit the remote store before any write is attempted.
    pub fn validate(&self, name: &str) -> Result<()> {
        let len = self.joined().chars().count();
        if len > CONTENT_BUDGET {
            return Err(PawError::RemoteWriteRejected {
                name: name.to_string(),
                reason: format!(
                    "concatenation \"username|url|note\" is {len} characters, at most {CONTENT_BUDGET} allowed"
                ),
            });
        }
        if self.username.contains(SEPARATOR) || self.url.contains(SEPARATOR) {
            return Err(PawError::RemoteWriteRejected {
                name: name.to_string(),
                reason: "username and url cannot contain '|'".into(),
            });
        }
        Ok(())
    }
}

/// Build the content tag for an item of `item_type`.
pub fn encode_tag(item_type: ItemType, fields: &ContentFields) -> String {
    format!("{}{SEPARATOR}{}", item_type.as_str(), fields.joined())
}

/// Parse a content tag back into a type and fields.
///
/// Secrets written by other tools carry no tag or a foreign one; those
/// are treated as logins with empty fields.
pub fn decode_tag(tag: Option<&str>) -> (ItemType, ContentFields) {
    let Some(tag) = tag else {
        return (ItemType::Login, ContentFields::default());
    };

    let mut parts = tag.splitn(4, SEPARATOR);
    let kind = parts.next().and_then(|k| k.parse::<ItemType>().ok());
    match (kind, parts.next(), parts.next(), parts.next()) {
        (Some(kind), Some(username), Some(url), Some(note)) => {
            (kind, ContentFields::new(username, url, note))
        }
        _ => (ItemType::Login, ContentFields::default()),
    }
}
