//! Document scopes: what a batch operation acts on.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use zotero_llm_core::defaults::PDF_CONTENT_TYPE;
use zotero_llm_core::{Collection, Document, DocumentStore, Result};

use crate::resolver::CollectionTree;

/// Yields the documents of a resolved scope. Attachments and notes are
/// never part of a scope.
#[derive(Clone)]
pub struct DocumentSource {
    store: Arc<dyn DocumentStore>,
}

impl DocumentSource {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Documents filed in a collection and, if `recursive`, in every
    /// collection below it. Each document appears once, in enumeration order.
    pub async fn documents_in(&self, collection_id: &str, recursive: bool) -> Result<Vec<Document>> {
        let mut scope = vec![collection_id.to_string()];
        if recursive {
            let tree = CollectionTree::new(self.store.list_collections().await?);
            scope.extend(tree.descendants(collection_id));
        }

        let mut seen = HashSet::new();
        let mut documents = Vec::new();
        for id in &scope {
            let items = self.store.collection_documents(id).await?;
            let before = documents.len();
            documents.extend(
                items
                    .into_iter()
                    .filter(|d| d.is_regular() && seen.insert(d.key.clone())),
            );
            debug!(
                subsystem = "tasks",
                component = "source",
                collection_id = %id,
                result_count = documents.len() - before,
                "Collected documents"
            );
        }

        info!(
            subsystem = "tasks",
            component = "source",
            collection_id,
            recursive,
            collections = scope.len(),
            result_count = documents.len(),
            "Scope resolved"
        );
        Ok(documents)
    }

    /// Regular documents that belong to no collection.
    pub async fn unfiled_documents(&self) -> Result<Vec<Document>> {
        let documents: Vec<Document> = self
            .store
            .all_documents()
            .await?
            .into_iter()
            .filter(|d| d.is_regular() && d.parent_item.is_none() && d.collections.is_empty())
            .collect();
        info!(
            subsystem = "tasks",
            component = "source",
            result_count = documents.len(),
            "Unfiled documents collected"
        );
        Ok(documents)
    }

    /// Full document snapshot.
    pub async fn all_documents(&self) -> Result<Vec<Document>> {
        self.store.all_documents().await
    }

    /// Full collection snapshot.
    pub async fn all_collections(&self) -> Result<Vec<Collection>> {
        self.store.all_collections().await
    }

    /// A single document by id.
    pub async fn document(&self, id: &str) -> Result<Document> {
        self.store.get_document(id).await
    }

    /// First search hit for `query`, if any.
    pub async fn first_match(&self, query: &str) -> Result<Option<Document>> {
        let hits = self.store.search(query, 1).await?;
        Ok(hits.into_iter().next())
    }

    /// Extractable full text for a document.
    ///
    /// An attachment yields its own indexed text. Any other document yields
    /// the text of its first PDF attachment that has some. Store failures
    /// are logged and treated as no text.
    pub async fn fulltext_for(&self, document: &Document) -> Option<String> {
        if document.is_attachment() {
            return match self.store.fulltext(&document.key).await {
                Ok(text) => text.filter(|t| !t.trim().is_empty()),
                Err(e) => {
                    warn!(
                        subsystem = "tasks",
                        component = "source",
                        document_id = %document.key,
                        error = %e,
                        "Failed to get fulltext for attachment"
                    );
                    None
                }
            };
        }

        let children = match self.store.children(&document.key).await {
            Ok(children) => children,
            Err(e) => {
                warn!(
                    subsystem = "tasks",
                    component = "source",
                    document_id = %document.key,
                    error = %e,
                    "Failed to get children"
                );
                return None;
            }
        };

        let pdfs = children
            .iter()
            .filter(|c| c.is_attachment() && c.content_type.as_deref() == Some(PDF_CONTENT_TYPE));

        for pdf in pdfs {
            match self.store.fulltext(&pdf.key).await {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    debug!(
                        subsystem = "tasks",
                        component = "source",
                        document_id = %document.key,
                        attachment_id = %pdf.key,
                        text_len = text.len(),
                        "Retrieved fulltext"
                    );
                    return Some(text);
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!(
                        subsystem = "tasks",
                        component = "source",
                        attachment_id = %pdf.key,
                        error = %e,
                        "Failed to get fulltext for attachment"
                    );
                }
            }
        }

        debug!(
            subsystem = "tasks",
            component = "source",
            document_id = %document.key,
            "No fulltext available"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zotero_llm_store::memory::{InMemoryStore, StoreOp};
    use zotero_llm_store::test_fixtures::{attachment, collection, note, paper};

    #[tokio::test]
    async fn test_unfiled_excludes_filed_children_and_notes() {
        let mut standalone_note = note("N1", "P1", "hello");
        standalone_note.parent_item = None;
        let store = Arc::new(
            InMemoryStore::new()
                .with_collection(collection("C1", "ML", None))
                .with_document(paper("P1", "Filed", &["C1"]))
                .with_document(paper("P2", "Unfiled", &[]))
                .with_document(attachment("A1", "P2", PDF_CONTENT_TYPE))
                .with_document(standalone_note),
        );
        let source = DocumentSource::new(store);
        let docs = source.unfiled_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].key, "P2");
    }

    #[tokio::test]
    async fn test_fulltext_prefers_first_pdf_with_text() {
        let store = Arc::new(
            InMemoryStore::new()
                .with_document(paper("P1", "Paper", &[]))
                .with_document(attachment("A0", "P1", "text/html"))
                .with_document(attachment("A1", "P1", PDF_CONTENT_TYPE))
                .with_document(attachment("A2", "P1", PDF_CONTENT_TYPE))
                .with_fulltext("A0", "html snapshot")
                .with_fulltext("A2", "pdf text"),
        );
        let source = DocumentSource::new(store.clone());
        let paper = store.document("P1").unwrap();
        assert_eq!(source.fulltext_for(&paper).await.as_deref(), Some("pdf text"));

        let pdf = store.document("A2").unwrap();
        assert_eq!(source.fulltext_for(&pdf).await.as_deref(), Some("pdf text"));
    }

    #[tokio::test]
    async fn test_fulltext_store_failure_is_no_text() {
        let store = Arc::new(
            InMemoryStore::new()
                .with_document(paper("P1", "Paper", &[]))
                .with_document(attachment("A1", "P1", PDF_CONTENT_TYPE))
                .with_fulltext("A1", "text"),
        );
        store.fail_on(StoreOp::Fulltext, "A1");
        let source = DocumentSource::new(store.clone());
        let paper = store.document("P1").unwrap();
        assert_eq!(source.fulltext_for(&paper).await, None);
    }
}
