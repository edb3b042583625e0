//! Canonical target resolution.
//!
//! Tags and notes are never written to attachments. Every component that
//! writes to a document goes through [`canonical_target`] first.

use tracing::debug;

use zotero_llm_core::{Document, DocumentStore, Error, Result};

/// The document that tags and notes for `document` belong to: the document
/// itself, or its parent when it is an attachment.
pub async fn canonical_target(store: &dyn DocumentStore, document: &Document) -> Result<Document> {
    if !document.is_attachment() {
        return Ok(document.clone());
    }

    let parent_id = document.parent_item.as_deref().ok_or_else(|| {
        Error::InvalidInput(format!(
            "Attachment {} has no parent item to annotate",
            document.key
        ))
    })?;

    debug!(
        subsystem = "tasks",
        document_id = %document.key,
        parent_id,
        "Attachment redirected to parent"
    );
    store.get_document(parent_id).await
}
