//! Core data models for zotero-llm.
//!
//! Documents and collections are shaped after the Zotero Web API `data`
//! objects so they can be read, modified, and written back without losing
//! fields this crate does not model. Anything not named here is carried in
//! `extra` and serialized back verbatim.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::tags::normalize_tag;

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// Coarse classification of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// A bibliographic record (journal article, book, preprint, ...).
    Regular,
    /// A file or link attached to a regular record.
    Attachment,
    /// A free-text annotation.
    Note,
}

impl DocumentKind {
    /// Classify a Zotero `itemType`.
    pub fn from_item_type(item_type: &str) -> Self {
        match item_type {
            "attachment" => Self::Attachment,
            "note" => Self::Note,
            _ => Self::Regular,
        }
    }
}

/// An author, editor, or other contributor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    #[serde(default)]
    pub creator_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Single-field name (institutions, mononyms).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Creator {
    /// Display name as `First Last`, or the single-field name.
    pub fn display_name(&self) -> String {
        if let Some(ref name) = self.name {
            return name.clone();
        }
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

/// A tag attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    pub tag: String,
    /// 0 = user tag, 1 = automatic tag.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tag_type: Option<u8>,
}

impl TagEntry {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            tag_type: None,
        }
    }
}

/// A record in the document store: a regular item, an attachment, or a note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub key: String,
    #[serde(default)]
    pub version: u64,
    pub item_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creators: Vec<Creator>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub abstract_note: String,
    #[serde(default)]
    pub tags: Vec<TagEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_item: Option<String>,
    /// MIME type, attachments only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// HTML body, notes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Fields not modeled above, preserved for whole-record updates.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Document {
    /// Create a bare document of the given item type.
    pub fn new(key: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            item_type: item_type.into(),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> DocumentKind {
        DocumentKind::from_item_type(&self.item_type)
    }

    pub fn is_attachment(&self) -> bool {
        self.kind() == DocumentKind::Attachment
    }

    pub fn is_note(&self) -> bool {
        self.kind() == DocumentKind::Note
    }

    /// Regular bibliographic record (neither attachment nor note).
    pub fn is_regular(&self) -> bool {
        self.kind() == DocumentKind::Regular
    }

    /// Title, or a placeholder when the record has none.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Unknown Title"
        } else {
            &self.title
        }
    }

    /// Creator display names joined with `, `.
    pub fn author_names(&self) -> String {
        self.creators
            .iter()
            .map(Creator::display_name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Case-insensitive tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = normalize_tag(tag);
        self.tags.iter().any(|t| normalize_tag(&t.tag) == wanted)
    }

    /// Add a tag unless an equivalent one is present. Returns whether the set changed.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.has_tag(tag) {
            return false;
        }
        self.tags.push(TagEntry::new(normalize_tag(tag)));
        true
    }

    /// Remove every equivalent tag. Returns whether the set changed.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let wanted = normalize_tag(tag);
        let before = self.tags.len();
        self.tags.retain(|t| normalize_tag(&t.tag) != wanted);
        self.tags.len() != before
    }

    /// Note body, or the empty string for non-notes.
    pub fn note_content(&self) -> &str {
        self.note.as_deref().unwrap_or_default()
    }
}

/// Fields for creating a new record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub tags: Vec<TagEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,
}

impl NewDocument {
    /// A note attached to `parent`.
    pub fn child_note(parent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            item_type: "note".to_string(),
            parent_item: Some(parent.into()),
            note: Some(content.into()),
            ..Default::default()
        }
    }

    /// A standalone note filed in `collection`.
    pub fn collection_note(collection: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            item_type: "note".to_string(),
            note: Some(content.into()),
            collections: vec![collection.into()],
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(TagEntry::new(normalize_tag(tag)));
        self
    }
}

// =============================================================================
// COLLECTION TYPES
// =============================================================================

/// A named node in the collection tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub key: String,
    #[serde(default)]
    pub version: u64,
    pub name: String,
    /// Zotero encodes "no parent" as `false`.
    #[serde(default, deserialize_with = "parent_or_false")]
    pub parent_collection: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Collection {
    pub fn new(key: impl Into<String>, name: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            parent_collection: parent.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_collection.is_none()
    }
}

fn parent_or_false<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) if !s.is_empty() => Ok(Some(s)),
        _ => Ok(None),
    }
}
