//! Batch execution over document lists and collection paths.
//!
//! Documents run strictly one after another. A failing document is recorded
//! and the batch moves on; a failing collection path is recorded and the
//! remaining paths still run.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use zotero_llm_core::defaults::BATCH_EVENT_CAPACITY;
use zotero_llm_core::{Document, DocumentStore, Error, Result};

use crate::resolver::PathResolver;
use crate::runner::{TaskOutcome, TaskRunner, TaskState};
use crate::shutdown::ShutdownSignal;
use crate::source::DocumentSource;
use crate::task::TaskKind;

/// Progress event emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// A collection path is about to be processed.
    ScopeStarted { path: String },
    /// A collection path could not be resolved or listed.
    ScopeFailed { path: String, error: String },
    /// A document is about to be processed (`index` is 1-based).
    DocumentStarted {
        index: usize,
        total: usize,
        document_id: String,
        title: String,
    },
    /// A document reached a terminal state.
    DocumentFinished {
        index: usize,
        total: usize,
        document_id: String,
        state: TaskState,
    },
    /// The batch stopped early on a shutdown request.
    Interrupted { completed: usize, total: usize },
}

/// A failed document.
#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    pub document_id: String,
    pub title: String,
    pub error: String,
}

/// A skipped document.
#[derive(Debug, Clone, Serialize)]
pub struct SkipEntry {
    pub document_id: String,
    pub title: String,
    pub reason: String,
}

/// Aggregate result of one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub task: TaskKind,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_no_text: usize,
    pub skipped_already_done: usize,
    pub failures: Vec<FailureEntry>,
    pub skips: Vec<SkipEntry>,
    pub outcomes: Vec<TaskOutcome>,
    pub interrupted: bool,
}

impl BatchReport {
    fn new(task: TaskKind, total: usize) -> Self {
        Self {
            task,
            total,
            succeeded: 0,
            failed: 0,
            skipped_no_text: 0,
            skipped_already_done: 0,
            failures: Vec::new(),
            skips: Vec::new(),
            outcomes: Vec::new(),
            interrupted: false,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_no_text + self.skipped_already_done
    }

    /// Documents that reached a terminal state.
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.skipped()
    }

    fn record(&mut self, outcome: TaskOutcome) {
        match outcome.state {
            TaskState::Succeeded => self.succeeded += 1,
            TaskState::Failed => {
                self.failed += 1;
                self.failures.push(FailureEntry {
                    document_id: outcome.document_id.clone(),
                    title: outcome.title.clone(),
                    error: outcome.error.clone().unwrap_or_default(),
                });
            }
            TaskState::SkippedNoText | TaskState::SkippedAlreadyDone => {
                if outcome.state == TaskState::SkippedNoText {
                    self.skipped_no_text += 1;
                } else {
                    self.skipped_already_done += 1;
                }
                self.skips.push(SkipEntry {
                    document_id: outcome.document_id.clone(),
                    title: outcome.title.clone(),
                    reason: outcome.skip_reason.clone().unwrap_or_default(),
                });
            }
        }
        self.outcomes.push(outcome);
    }
}

/// Result of one collection path in a multi-path run.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScopeReport {
    fn failed(path: &str, collection_id: Option<String>, error: &Error) -> Self {
        Self {
            path: path.to_string(),
            collection_id,
            batch: None,
            error: Some(error.to_string()),
        }
    }
}

/// Fans a [`TaskRunner`] out over documents and collection paths.
pub struct BatchCoordinator {
    runner: TaskRunner,
    resolver: PathResolver,
    source: DocumentSource,
    event_tx: broadcast::Sender<BatchEvent>,
}

impl BatchCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, runner: TaskRunner) -> Self {
        let (event_tx, _) = broadcast::channel(BATCH_EVENT_CAPACITY);
        Self {
            runner,
            resolver: PathResolver::new(store.clone()),
            source: DocumentSource::new(store),
            event_tx,
        }
    }

    /// Receiver for progress events. Events sent with no subscriber are dropped.
    pub fn events(&self) -> broadcast::Receiver<BatchEvent> {
        self.event_tx.subscribe()
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    fn shutdown(&self) -> &ShutdownSignal {
        self.runner.shutdown()
    }

    fn emit(&self, event: BatchEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Run the task over `documents` in order.
    pub async fn run_over(&self, documents: &[Document], skip_if_done: bool) -> BatchReport {
        let total = documents.len();
        let mut report = BatchReport::new(self.runner.task(), total);
        info!(
            subsystem = "tasks",
            component = "coordinator",
            task = %self.runner.task(),
            total,
            "Batch started"
        );

        for (i, document) in documents.iter().enumerate() {
            if self.shutdown().is_triggered() {
                report.interrupted = true;
                break;
            }

            let index = i + 1;
            self.emit(BatchEvent::DocumentStarted {
                index,
                total,
                document_id: document.key.clone(),
                title: document.display_title().to_string(),
            });

            let outcome = match self.runner.run(document, skip_if_done).await {
                Ok(outcome) => outcome,
                Err(Error::Interrupted) => {
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    error!(
                        subsystem = "tasks",
                        component = "coordinator",
                        document_id = %document.key,
                        error = %e,
                        "Document failed"
                    );
                    TaskOutcome::failed(document, &e)
                }
            };

            self.emit(BatchEvent::DocumentFinished {
                index,
                total,
                document_id: outcome.document_id.clone(),
                state: outcome.state,
            });
            report.record(outcome);
        }

        if report.interrupted {
            warn!(
                subsystem = "tasks",
                component = "coordinator",
                completed = report.processed(),
                total,
                "Batch interrupted"
            );
            self.emit(BatchEvent::Interrupted {
                completed: report.processed(),
                total,
            });
        }

        info!(
            subsystem = "tasks",
            component = "coordinator",
            total,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped(),
            "Batch complete"
        );
        report
    }

    /// Resolve a single collection path and run the task over its scope.
    pub async fn run_over_path(
        &self,
        path: &str,
        recursive: bool,
        skip_if_done: bool,
    ) -> Result<BatchReport> {
        let collection_id = self.resolver.resolve(path).await?;
        let documents = self.source.documents_in(&collection_id, recursive).await?;
        Ok(self.run_over(&documents, skip_if_done).await)
    }

    /// Run the task over each collection path in order, isolating failures
    /// per path.
    pub async fn run_over_scopes(
        &self,
        paths: &[String],
        recursive: bool,
        skip_if_done: bool,
    ) -> Vec<ScopeReport> {
        let mut reports = Vec::with_capacity(paths.len());

        for path in paths {
            if self.shutdown().is_triggered() {
                break;
            }
            self.emit(BatchEvent::ScopeStarted { path: path.clone() });

            let collection_id = match self.resolver.resolve(path).await {
                Ok(id) => id,
                Err(e) => {
                    self.scope_failed(path, &e);
                    reports.push(ScopeReport::failed(path, None, &e));
                    continue;
                }
            };

            let documents = match self.source.documents_in(&collection_id, recursive).await {
                Ok(documents) => documents,
                Err(e) => {
                    self.scope_failed(path, &e);
                    reports.push(ScopeReport::failed(path, Some(collection_id), &e));
                    continue;
                }
            };

            let batch = self.run_over(&documents, skip_if_done).await;
            reports.push(ScopeReport {
                path: path.clone(),
                collection_id: Some(collection_id),
                batch: Some(batch),
                error: None,
            });
        }

        reports
    }

    fn scope_failed(&self, path: &str, e: &Error) {
        error!(
            subsystem = "tasks",
            component = "coordinator",
            collection_path = path,
            error = %e,
            "Collection scope failed"
        );
        self.emit(BatchEvent::ScopeFailed {
            path: path.to_string(),
            error: e.to_string(),
        });
    }

    /// Run the task over every unfiled document.
    pub async fn run_unfiled(&self, skip_if_done: bool) -> Result<BatchReport> {
        let documents = self.source.unfiled_documents().await?;
        Ok(self.run_over(&documents, skip_if_done).await)
    }
}
