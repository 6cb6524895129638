//! The concrete item kinds and the `Item` variant over them.
//!
//! Each kind holds a `Metadata` value next to its own fields. Shared
//! behavior lives on `Item` and dispatches on the variant, so adding a
//! kind is a compile error everywhere a match needs updating.

use serde::{Deserialize, Serialize};

use super::content::ContentFields;
use super::metadata::{ItemType, Metadata};

/// Username/password credential for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    pub metadata: Metadata,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub note: String,
}

/// Free-form secure note. The body is the secret value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub metadata: Metadata,
    #[serde(default)]
    pub body: String,
}

/// A bare password with an optional note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Password {
    pub metadata: Metadata,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub note: String,
}

/// Website account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    pub metadata: Metadata,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub note: String,
}

/// A typed vault item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Item {
    Login(Login),
    Note(Note),
    Password(Password),
    Website(Website),
}

impl Item {
    pub fn metadata(&self) -> &Metadata {
        match self {
            Item::Login(i) => &i.metadata,
            Item::Note(i) => &i.metadata,
            Item::Password(i) => &i.metadata,
            Item::Website(i) => &i.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        match self {
            Item::Login(i) => &mut i.metadata,
            Item::Note(i) => &mut i.metadata,
            Item::Password(i) => &mut i.metadata,
            Item::Website(i) => &mut i.metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    /// The tag of the variant. Always agrees with `metadata().item_type`
    /// for items built through `Item::assemble`.
    pub fn item_type(&self) -> ItemType {
        match self {
            Item::Login(_) => ItemType::Login,
            Item::Note(_) => ItemType::Note,
            Item::Password(_) => ItemType::Password,
            Item::Website(_) => ItemType::Website,
        }
    }

    /// The value kept as the remote secret payload.
    pub fn secret_value(&self) -> &str {
        match self {
            Item::Login(i) => &i.password,
            Item::Note(i) => &i.body,
            Item::Password(i) => &i.password,
            Item::Website(i) => &i.password,
        }
    }

    /// The credential checked against breach corpora, if the kind has one.
    pub fn password(&self) -> Option<&str> {
        match self {
            Item::Login(i) => Some(i.password.as_str()),
            Item::Password(i) => Some(i.password.as_str()),
            Item::Website(i) => Some(i.password.as_str()),
            Item::Note(_) => None,
        }
        .filter(|p| !p.is_empty())
    }

    /// The non-secret fields kept in the remote content tag.
    pub fn content_fields(&self) -> ContentFields {
        match self {
            Item::Login(i) => ContentFields::new(&i.username, &i.url, &i.note),
            Item::Note(_) => ContentFields::default(),
            Item::Password(i) => ContentFields::new("", "", &i.note),
            Item::Website(i) => ContentFields::new(&i.username, &i.uri, &i.note),
        }
    }

    /// Rebuild an item from its metadata, tag fields and secret value.
    pub fn assemble(metadata: Metadata, fields: ContentFields, value: String) -> Self {
        match metadata.item_type {
            ItemType::Login => Item::Login(Login {
                metadata,
                username: fields.username,
                url: fields.url,
                password: value,
                note: fields.note,
            }),
            ItemType::Note => Item::Note(Note {
                metadata,
                body: value,
            }),
            ItemType::Password => Item::Password(Password {
                metadata,
                password: value,
                note: fields.note,
            }),
            ItemType::Website => Item::Website(Website {
                metadata,
                username: fields.username,
                uri: fields.url,
                password: value,
                note: fields.note,
            }),
        }
    }

    /// Deserialize an item whose kind is known from context (e.g. the
    /// archive group it was found under).
    pub fn from_json_value(item_type: ItemType, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match item_type {
            ItemType::Login => Item::Login(serde_json::from_value(value)?),
            ItemType::Note => Item::Note(serde_json::from_value(value)?),
            ItemType::Password => Item::Password(serde_json::from_value(value)?),
            ItemType::Website => Item::Website(serde_json::from_value(value)?),
        })
    }

    pub fn login(name: &str, username: &str, url: &str, password: &str) -> Self {
        Item::Login(Login {
            metadata: Metadata::new(name, ItemType::Login),
            username: username.to_string(),
            url: url.to_string(),
            password: password.to_string(),
            note: String::new(),
        })
    }

    pub fn note(name: &str, body: &str) -> Self {
        Item::Note(Note {
            metadata: Metadata::new(name, ItemType::Note),
            body: body.to_string(),
        })
    }

    pub fn password_item(name: &str, password: &str) -> Self {
        Item::Password(Password {
            metadata: Metadata::new(name, ItemType::Password),
            password: password.to_string(),
            note: String::new(),
        })
    }

    pub fn website(name: &str, username: &str, uri: &str, password: &str) -> Self {
        Item::Website(Website {
            metadata: Metadata::new(name, ItemType::Website),
            username: username.to_string(),
            uri: uri.to_string(),
            password: password.to_string(),
            note: String::new(),
        })
    }

    /// Same payload ignoring timestamps and favicon.
    pub fn same_payload(&self, other: &Item) -> bool {
        self.name() == other.name()
            && self.item_type() == other.item_type()
            && self.secret_value() == other.secret_value()
            && self.content_fields() == other.content_fields()
    }
}
