//! Library-wide reconciliation of a derived flag tag.
//!
//! One bulk snapshot of documents and collections drives the whole pass:
//! the set of documents that have a qualifying attachment is computed once,
//! and every regular document is compared against it. Only documents whose
//! flag disagrees with that set are written.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use zotero_llm_core::defaults::{MISSING_PDF_TAG, PDF_CONTENT_TYPE};
use zotero_llm_core::{Document, DocumentStore, Result};

use crate::coordinator::FailureEntry;
use crate::resolver::CollectionTree;
use crate::shutdown::ShutdownSignal;
use crate::source::DocumentSource;

/// Attachment predicate for the default flag.
pub fn is_pdf_attachment(document: &Document) -> bool {
    document.is_attachment() && document.content_type.as_deref() == Some(PDF_CONTENT_TYPE)
}

/// A document whose flag changed.
#[derive(Debug, Clone, Serialize)]
pub struct FlagChange {
    pub document_id: String,
    pub title: String,
    /// Full paths of the collections the document is filed in.
    pub collections: Vec<String>,
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub flag_tag: String,
    /// Regular documents with at least one qualifying attachment.
    pub items_with_pdfs: usize,
    pub items_without_pdfs: usize,
    pub flags_added: usize,
    pub flags_removed: usize,
    pub errors: usize,
    pub added: Vec<FlagChange>,
    pub removed: Vec<FlagChange>,
    pub failures: Vec<FailureEntry>,
    pub interrupted: bool,
}

impl ReconcileReport {
    fn new(flag_tag: &str) -> Self {
        Self {
            flag_tag: flag_tag.to_string(),
            items_with_pdfs: 0,
            items_without_pdfs: 0,
            flags_added: 0,
            flags_removed: 0,
            errors: 0,
            added: Vec::new(),
            removed: Vec::new(),
            failures: Vec::new(),
            interrupted: false,
        }
    }
}

/// Keeps a flag tag consistent with actual attachment state.
pub struct ReconciliationEngine {
    store: Arc<dyn DocumentStore>,
    source: DocumentSource,
    shutdown: ShutdownSignal,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            source: DocumentSource::new(store.clone()),
            store,
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Reconcile the default `missing_pdf` flag.
    pub async fn reconcile_missing_pdf(&self) -> Result<ReconcileReport> {
        self.reconcile_missing_flag(MISSING_PDF_TAG, is_pdf_attachment)
            .await
    }

    /// Flag every regular document that has no attachment matching
    /// `predicate`, and unflag every one that has.
    pub async fn reconcile_missing_flag<P>(&self, flag_tag: &str, predicate: P) -> Result<ReconcileReport>
    where
        P: Fn(&Document) -> bool + Send + Sync,
    {
        let documents = self.source.all_documents().await?;
        let tree = CollectionTree::new(self.source.all_collections().await?);

        let with_source: HashSet<&str> = documents
            .iter()
            .filter(|d| d.is_attachment() && predicate(*d))
            .filter_map(|d| d.parent_item.as_deref())
            .collect();

        let mut report = ReconcileReport::new(flag_tag);

        for document in documents.iter().filter(|d| d.is_regular()) {
            let has_source = with_source.contains(document.key.as_str());
            if has_source {
                report.items_with_pdfs += 1;
            } else {
                report.items_without_pdfs += 1;
            }

            let flagged = document.has_tag(flag_tag);
            if has_source != flagged {
                continue;
            }

            if self.shutdown.is_triggered() {
                report.interrupted = true;
                break;
            }

            let mut updated = document.clone();
            if has_source {
                updated.remove_tag(flag_tag);
            } else {
                updated.add_tag(flag_tag);
            }

            match self.store.update_document(&updated).await {
                Ok(()) => {
                    let change = FlagChange {
                        document_id: document.key.clone(),
                        title: document.display_title().to_string(),
                        collections: document.collections.iter().map(|c| tree.path_of(c)).collect(),
                    };
                    if has_source {
                        report.flags_removed += 1;
                        report.removed.push(change);
                    } else {
                        report.flags_added += 1;
                        report.added.push(change);
                    }
                }
                Err(e) => {
                    error!(
                        subsystem = "tasks",
                        component = "reconcile",
                        document_id = %document.key,
                        error = %e,
                        "Failed to update flag"
                    );
                    report.errors += 1;
                    report.failures.push(FailureEntry {
                        document_id: document.key.clone(),
                        title: document.display_title().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            subsystem = "tasks",
            component = "reconcile",
            flag_tag,
            with_source = report.items_with_pdfs,
            without_source = report.items_without_pdfs,
            added = report.flags_added,
            removed = report.flags_removed,
            errors = report.errors,
            "Reconciliation complete"
        );
        Ok(report)
    }
}
