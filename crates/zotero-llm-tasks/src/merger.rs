//! Writing generated content into notes.
//!
//! Per-document analysis always creates a new note, suffixing the title
//! when it collides with an existing one. QA sessions append to the first
//! note carrying the QA marker and only create one when none exists.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use zotero_llm_core::{Document, DocumentStore, NewDocument, Result};

/// `<h2>{title}</h2>`, the marker every generated note starts with.
pub fn title_marker(title: &str) -> String {
    format!("<h2>{}</h2>", title)
}

/// Smallest collision-free variant of `title` among existing note bodies:
/// `title`, then `title (1)`, `title (2)`, ...
pub fn unique_title(title: &str, existing: &[&str]) -> String {
    let taken = |candidate: &str| {
        let marker = title_marker(candidate);
        existing.iter().any(|content| content.starts_with(&marker))
    };

    if !taken(title) {
        return title.to_string();
    }
    (1..)
        .map(|n| format!("{} ({})", title, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| title.to_string())
}

/// Whether a note was written by a run titled `title`, including suffixed
/// variants such as `title (2)`.
pub fn has_title(content: &str, title: &str) -> bool {
    content.starts_with(&title_marker(title)) || content.starts_with(&format!("<h2>{} (", title))
}

/// Note body without the title marker, model line, and `<pre>` wrapper.
pub fn note_body(content: &str) -> &str {
    let mut rest = content.trim();
    if rest.starts_with("<h2>") {
        if let Some(end) = rest.find("</h2>") {
            rest = rest[end + "</h2>".len()..].trim_start();
        }
    }
    if rest.starts_with("<p><strong>Model:</strong>") {
        if let Some(end) = rest.find("</p>") {
            rest = rest[end + "</p>".len()..].trim_start();
        }
    }
    if let Some(inner) = rest.strip_prefix("<pre>") {
        rest = inner.strip_suffix("</pre>").unwrap_or(inner);
    }
    rest.trim()
}

fn note_content(title: &str, model: &str, body: &str) -> String {
    format!(
        "{}<p><strong>Model:</strong> {}</p>{}",
        title_marker(title),
        model,
        body
    )
}

/// Where an appendable note lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteTarget {
    /// Child note of a document.
    Document(String),
    /// Standalone note filed in a collection.
    Collection(String),
}

impl NoteTarget {
    pub fn id(&self) -> &str {
        match self {
            Self::Document(id) | Self::Collection(id) => id,
        }
    }
}

/// Result of an append-or-create write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub note_id: String,
    pub appended: bool,
}

/// Persists generated content as notes.
#[derive(Clone)]
pub struct AnnotationMerger {
    store: Arc<dyn DocumentStore>,
}

impl AnnotationMerger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn notes_at(&self, target: &NoteTarget) -> Result<Vec<Document>> {
        let records = match target {
            NoteTarget::Document(id) => self.store.children(id).await?,
            NoteTarget::Collection(id) => self.store.collection_documents(id).await?,
        };
        Ok(records.into_iter().filter(Document::is_note).collect())
    }

    /// Create a new child note under `parent_id`, titled uniquely among its
    /// existing notes. Returns the new note's key.
    pub async fn create_unique(
        &self,
        parent_id: &str,
        title: &str,
        body: &str,
        model: &str,
    ) -> Result<String> {
        let unique = match self.notes_at(&NoteTarget::Document(parent_id.to_string())).await {
            Ok(notes) => {
                let existing: Vec<&str> = notes.iter().map(Document::note_content).collect();
                unique_title(title, &existing)
            }
            Err(e) => {
                warn!(
                    subsystem = "tasks",
                    component = "merger",
                    document_id = parent_id,
                    error = %e,
                    "Could not check existing notes"
                );
                title.to_string()
            }
        };

        let key = self
            .store
            .create_document(NewDocument::child_note(
                parent_id,
                note_content(&unique, model, body),
            ))
            .await?;
        info!(
            subsystem = "tasks",
            component = "merger",
            document_id = parent_id,
            note_id = %key,
            title = %unique,
            "Created note"
        );
        Ok(key)
    }

    /// Append `block` to the first note at `target` containing the
    /// `<h2>{title}</h2>` marker, or create that note.
    ///
    /// `tags` are applied to a created note and added to an appended one.
    pub async fn append_or_create(
        &self,
        target: &NoteTarget,
        title: &str,
        block: &str,
        model: &str,
        tags: &[&str],
    ) -> Result<MergeOutcome> {
        let marker = title_marker(title);
        let existing = self
            .notes_at(target)
            .await?
            .into_iter()
            .find(|n| n.note_content().contains(&marker));

        if let Some(mut note) = existing {
            let content = format!("{}\n{}", note.note_content(), block);
            note.note = Some(content);
            for tag in tags {
                note.add_tag(tag);
            }
            self.store.update_document(&note).await?;
            info!(
                subsystem = "tasks",
                component = "merger",
                target_id = target.id(),
                note_id = %note.key,
                "Appended to existing note"
            );
            return Ok(MergeOutcome {
                note_id: note.key,
                appended: true,
            });
        }

        let content = note_content(title, model, block);
        let mut new_note = match target {
            NoteTarget::Document(id) => NewDocument::child_note(id.as_str(), content),
            NoteTarget::Collection(id) => NewDocument::collection_note(id.as_str(), content),
        };
        for tag in tags {
            new_note = new_note.with_tag(tag);
        }
        let key = self.store.create_document(new_note).await?;
        info!(
            subsystem = "tasks",
            component = "merger",
            target_id = target.id(),
            note_id = %key,
            "Created note"
        );
        Ok(MergeOutcome {
            note_id: key,
            appended: false,
        })
    }
}
