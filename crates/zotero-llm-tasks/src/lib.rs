//! # zotero-llm-tasks
//!
//! Batch LLM task orchestration over a Zotero library.
//!
//! This crate provides:
//! - Collection path resolution and document scope enumeration
//! - Per-document task execution with skip-if-done and note/tag writes
//! - Sequential batch runs with per-document and per-path failure isolation
//! - Library-wide reconciliation of the `missing_pdf` flag
//! - Collection-wide question answering over existing summaries
//! - Interactive single-paper QA sessions
//! - Cooperative shutdown and progress events via broadcast channels
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zotero_llm_tasks::{BatchCoordinator, PromptLibrary, TaskKind, TaskRunner, TaskSettings};
//!
//! let prompts = PromptLibrary::load("prompts.yaml")?;
//! let runner = TaskRunner::new(
//!     store.clone(),
//!     backend,
//!     &prompts,
//!     TaskKind::LlmSummary,
//!     TaskSettings::default(),
//! )?;
//! let coordinator = BatchCoordinator::new(store, runner);
//!
//! // Listen for progress
//! let mut events = coordinator.events();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! let report = coordinator.run_over_path("Research/ML", true, true).await?;
//! println!("{} succeeded, {} failed", report.succeeded, report.failed);
//! ```

pub mod aggregate;
pub mod chat;
pub mod coordinator;
pub mod merger;
pub mod prompts;
pub mod reconcile;
pub mod resolver;
pub mod runner;
pub mod shutdown;
pub mod source;
pub mod target;
pub mod task;

// Re-export core types
pub use zotero_llm_core::{Error, Result};

pub use aggregate::{AggregationPipeline, AggregationResult, AggregationSettings};
pub use chat::{search_papers, Exchange, QaSession};
pub use coordinator::{BatchCoordinator, BatchEvent, BatchReport, FailureEntry, ScopeReport, SkipEntry};
pub use merger::{AnnotationMerger, MergeOutcome, NoteTarget};
pub use prompts::PromptLibrary;
pub use reconcile::{FlagChange, ReconcileReport, ReconciliationEngine};
pub use resolver::{CollectionTree, PathResolver};
pub use runner::{TaskOutcome, TaskRunner, TaskState};
pub use shutdown::ShutdownSignal;
pub use source::DocumentSource;
pub use target::canonical_target;
pub use task::{TaskKind, TaskSettings};
