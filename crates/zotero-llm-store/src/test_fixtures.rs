//! Test data builders for store-backed tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zotero_llm_store::memory::InMemoryStore;
//! use zotero_llm_store::test_fixtures::{attachment, collection, paper};
//!
//! let store = InMemoryStore::new()
//!     .with_collection(collection("C1", "ML", None))
//!     .with_document(paper("P1", "Attention Is All You Need", &["C1"]))
//!     .with_document(attachment("A1", "P1", "application/pdf"))
//!     .with_fulltext("A1", "We propose the Transformer...");
//! ```

use zotero_llm_core::{Collection, Creator, Document, TagEntry};

/// A journal article filed in `collections`, with one author and an abstract.
pub fn paper(key: &str, title: &str, collections: &[&str]) -> Document {
    let mut doc = Document::new(key, "journalArticle");
    doc.version = 1;
    doc.title = title.to_string();
    doc.abstract_note = format!("Abstract of {}", title);
    doc.creators = vec![Creator {
        creator_type: "author".to_string(),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        name: None,
    }];
    doc.collections = collections.iter().map(|c| c.to_string()).collect();
    doc
}

/// A paper carrying `tags`.
pub fn tagged_paper(key: &str, title: &str, collections: &[&str], tags: &[&str]) -> Document {
    let mut doc = paper(key, title, collections);
    doc.tags = tags.iter().map(|t| TagEntry::new(*t)).collect();
    doc
}

/// A file attachment under `parent`.
pub fn attachment(key: &str, parent: &str, content_type: &str) -> Document {
    let mut doc = Document::new(key, "attachment");
    doc.version = 1;
    doc.title = format!("{}.pdf", key);
    doc.parent_item = Some(parent.to_string());
    doc.content_type = Some(content_type.to_string());
    doc
}

/// A child note under `parent`.
pub fn note(key: &str, parent: &str, content: &str) -> Document {
    let mut doc = Document::new(key, "note");
    doc.version = 1;
    doc.parent_item = Some(parent.to_string());
    doc.note = Some(content.to_string());
    doc
}

/// A collection node.
pub fn collection(key: &str, name: &str, parent: Option<&str>) -> Collection {
    let mut c = Collection::new(key, name, parent);
    c.version = 1;
    c
}
