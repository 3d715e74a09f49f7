//! Data models for postgrab
//!
//! Defines the records kept by the store: parsed posts (`Item`), queued
//! links (`TodoEntry`) and per-URL parse failures reported by the parser
//! service. Field names on the wire and on disk are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A parsed social post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Stable identifier derived from the URL
    #[serde(default)]
    pub id: String,
    /// The post URL as submitted
    pub url: String,
    /// Post title
    #[serde(default)]
    pub title: String,
    /// Full body text
    #[serde(default)]
    pub content: String,
    /// Tags, in post order
    #[serde(default)]
    pub tags: Vec<String>,
    /// Image URLs, in post order
    #[serde(default)]
    pub images: Vec<String>,
    /// Cover image (usually the first image)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    /// When this item entered the store
    #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Whether this item currently sits in the trash
    #[serde(default)]
    pub is_deleted: bool,
}

impl Item {
    /// Create a new item for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: Self::derive_id(&url),
            url,
            title: String::new(),
            content: String::new(),
            tags: Vec::new(),
            images: Vec::new(),
            cover_image: None,
            created_at: Utc::now(),
            is_deleted: false,
        }
    }

    /// Derive the identifier for a URL
    ///
    /// Re-parsing the same URL always yields the same id.
    pub fn derive_id(url: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string()
    }

    /// Fill in the id when the parser service did not supply one
    pub fn ensure_id(&mut self) {
        if self.id.trim().is_empty() {
            self.id = Self::derive_id(&self.url);
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Short id used for display and prefix lookup
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

/// A post as reported by the parser service
///
/// Only the content fields are read. Store bookkeeping such as `createdAt`
/// or `isDeleted` is ignored here and stamped when the post is saved, and a
/// `null` content field reads as empty.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedNote {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
}

impl ParsedNote {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Turn the note into a live item created at `created_at`
    pub fn into_item(self, created_at: DateTime<Utc>) -> Item {
        let mut item = Item {
            id: self.id,
            url: self.url,
            title: self.title,
            content: self.content,
            tags: self.tags,
            images: self.images,
            cover_image: self.cover_image,
            created_at,
            is_deleted: false,
        };
        item.ensure_id();
        item
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A queued link waiting to be parsed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoEntry {
    pub url: String,
    #[serde(default)]
    pub parsed: bool,
}

impl TodoEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parsed: false,
        }
    }
}

/// A URL the parser service could not handle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseFailure {
    pub url: String,
    #[serde(default)]
    pub error: String,
}

/// The collections that hold items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemCollection {
    Active,
    Trash,
}

impl From<ItemCollection> for Collection {
    fn from(collection: ItemCollection) -> Self {
        match collection {
            ItemCollection::Active => Collection::Active,
            ItemCollection::Trash => Collection::Trash,
        }
    }
}

/// All persisted collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Items visible to the user
    Active,
    /// Items moved out of Active
    Trash,
    /// Pending/parsed link queue
    Todo,
    /// Recently requested URLs, most recent first
    History,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Active,
        Collection::Trash,
        Collection::Todo,
        Collection::History,
    ];

    /// Key under which the collection is persisted
    pub fn storage_key(self) -> &'static str {
        match self {
            Collection::Active => "notes",
            Collection::Trash => "trash",
            Collection::Todo => "todo",
            Collection::History => "parse_history",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Collection::Active => "active",
            Collection::Trash => "trash",
            Collection::Todo => "todo",
            Collection::History => "history",
        };
        write!(f, "{}", name)
    }
}
