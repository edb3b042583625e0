//! Single-document task execution.
//!
//! A run moves through a fixed sequence: idempotence check on the canonical
//! target, full-text acquisition, prompt assembly, generation, note write,
//! tag write. The tag is only written when the note was, so a document
//! whose note failed is picked up again by the next run.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use zotero_llm_core::{Document, DocumentStore, Error, GenerationBackend, Result};

use crate::merger::AnnotationMerger;
use crate::prompts::PromptLibrary;
use crate::shutdown::ShutdownSignal;
use crate::source::DocumentSource;
use crate::target::canonical_target;
use crate::task::{TaskKind, TaskSettings};

/// Terminal state of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    SkippedAlreadyDone,
    SkippedNoText,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::SkippedAlreadyDone | Self::SkippedNoText)
    }
}

/// What happened to one document.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub document_id: String,
    pub title: String,
    pub state: TaskState,
    pub has_fulltext: bool,
    pub fulltext_length: usize,
    pub note_created: bool,
    pub tag_added: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskOutcome {
    fn new(document: &Document, state: TaskState) -> Self {
        Self {
            document_id: document.key.clone(),
            title: document.display_title().to_string(),
            state,
            has_fulltext: false,
            fulltext_length: 0,
            note_created: false,
            tag_added: false,
            analysis: None,
            skip_reason: None,
            error: None,
        }
    }

    fn skipped(document: &Document, state: TaskState, reason: String) -> Self {
        Self {
            skip_reason: Some(reason),
            ..Self::new(document, state)
        }
    }

    /// Outcome for a document whose run returned an error.
    pub fn failed(document: &Document, error: &Error) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(document, TaskState::Failed)
        }
    }
}

/// Build the generation prompt for a document.
pub fn build_prompt(template: &str, document: &Document, fulltext: &str) -> String {
    format!(
        "\n{}\n\nResearch Paper Details:\nTitle: {}\nAuthors: {}\nAbstract: {}\n\nFull Text:\n{}\n",
        template,
        document.display_title(),
        document.author_names(),
        document.abstract_note,
        fulltext
    )
}

/// Reject prompts over the configured character limit.
pub fn check_prompt_size(prompt: &str, max: Option<usize>) -> Result<()> {
    if let Some(max) = max {
        let actual = prompt.chars().count();
        if actual > max {
            return Err(Error::PromptTooLarge { actual, max });
        }
    }
    Ok(())
}

/// Executes one task against one document at a time.
pub struct TaskRunner {
    store: Arc<dyn DocumentStore>,
    backend: Arc<dyn GenerationBackend>,
    source: DocumentSource,
    merger: AnnotationMerger,
    task: TaskKind,
    template: String,
    settings: TaskSettings,
    shutdown: ShutdownSignal,
}

impl TaskRunner {
    /// Create a runner. Fails with a configuration error when the prompt
    /// library has no template for the task.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        backend: Arc<dyn GenerationBackend>,
        prompts: &PromptLibrary,
        task: TaskKind,
        settings: TaskSettings,
    ) -> Result<Self> {
        let template = prompts.require(task.prompt_key())?.to_string();
        Ok(Self {
            source: DocumentSource::new(store.clone()),
            merger: AnnotationMerger::new(store.clone()),
            store,
            backend,
            task,
            template,
            settings,
            shutdown: ShutdownSignal::new(),
        })
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    fn check_interrupted(&self) -> Result<()> {
        if self.shutdown.is_triggered() {
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    /// Run the task on `document`.
    ///
    /// Returns `Err` for failures (size limit, generation, store reads);
    /// skips and partial write failures are reported in the outcome.
    #[instrument(
        skip(self, document),
        fields(subsystem = "tasks", component = "runner", task = %self.task, document_id = %document.key)
    )]
    pub async fn run(&self, document: &Document, skip_if_done: bool) -> Result<TaskOutcome> {
        let target = canonical_target(self.store.as_ref(), document).await?;

        if skip_if_done && target.has_tag(self.task.tag()) {
            debug!(document_id = %target.key, tag = self.task.tag(), "Already done");
            return Ok(TaskOutcome::skipped(
                &target,
                TaskState::SkippedAlreadyDone,
                format!("Already tagged '{}'", self.task.tag()),
            ));
        }

        let fulltext = if self.settings.include_fulltext {
            match self.source.fulltext_for(document).await {
                Some(text) => text,
                None => {
                    info!(document_id = %document.key, "No full text available, skipping");
                    return Ok(TaskOutcome::skipped(
                        &target,
                        TaskState::SkippedNoText,
                        "No full text available".to_string(),
                    ));
                }
            }
        } else {
            String::new()
        };

        let prompt = build_prompt(&self.template, &target, &fulltext);
        check_prompt_size(&prompt, self.settings.max_prompt_chars)?;
        self.check_interrupted()?;

        // Nothing has been written yet, so an in-flight call can be dropped
        let start = Instant::now();
        let analysis = tokio::select! {
            analysis = self.backend.generate(&prompt) => analysis?,
            _ = self.shutdown.triggered() => {
                info!(document_id = %document.key, "Generation abandoned on shutdown");
                return Err(Error::Interrupted);
            }
        };
        info!(
            prompt_len = prompt.len(),
            response_len = analysis.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );
        self.check_interrupted()?;

        let mut outcome = TaskOutcome::new(&target, TaskState::Succeeded);
        outcome.has_fulltext = !fulltext.is_empty();
        outcome.fulltext_length = fulltext.chars().count();

        if self.settings.create_note && !analysis.trim().is_empty() {
            let body = format!("<pre>{}</pre>", analysis);
            match self
                .merger
                .create_unique(&target.key, self.task.note_title(), &body, self.backend.model_name())
                .await
            {
                Ok(_) => outcome.note_created = true,
                Err(e) => warn!(error = %e, "Failed to create note"),
            }
        }

        if outcome.note_created {
            match self.add_tag(&target.key).await {
                Ok(()) => outcome.tag_added = true,
                Err(e) => warn!(tag = self.task.tag(), error = %e, "Failed to add tag"),
            }
        }

        outcome.analysis = Some(analysis);
        Ok(outcome)
    }

    /// Re-read the target and add the task tag.
    async fn add_tag(&self, id: &str) -> Result<()> {
        let mut document = self.store.get_document(id).await?;
        if document.add_tag(self.task.tag()) {
            self.store.update_document(&document).await?;
            info!(document_id = id, tag = self.task.tag(), "Added tag");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zotero_llm_core::defaults::PDF_CONTENT_TYPE;
    use zotero_llm_inference::mock::MockGenerationBackend;
    use zotero_llm_store::memory::{InMemoryStore, StoreOp};
    use zotero_llm_store::test_fixtures::{attachment, paper, tagged_paper};

    fn prompts() -> PromptLibrary {
        PromptLibrary::default()
            .with_template("analyze_item", "Summarize.")
            .with_template("key_references", "List references.")
    }

    fn runner(store: Arc<InMemoryStore>, backend: MockGenerationBackend, settings: TaskSettings) -> TaskRunner {
        TaskRunner::new(store, Arc::new(backend), &prompts(), TaskKind::LlmSummary, settings).unwrap()
    }

    fn store_with_pdf() -> Arc<InMemoryStore> {
        Arc::new(
            InMemoryStore::new()
                .with_document(paper("P1", "Attention Is All You Need", &[]))
                .with_document(attachment("A1", "P1", PDF_CONTENT_TYPE))
                .with_fulltext("A1", "We propose the Transformer."),
        )
    }

    #[test]
    fn test_build_prompt_layout() {
        let doc = paper("P1", "Title", &[]);
        let prompt = build_prompt("Summarize.", &doc, "Body");
        assert_eq!(
            prompt,
            "\nSummarize.\n\nResearch Paper Details:\nTitle: Title\nAuthors: Ada Lovelace\nAbstract: Abstract of Title\n\nFull Text:\nBody\n"
        );
    }

    #[test]
    fn test_check_prompt_size_reports_actual_and_max() {
        assert!(check_prompt_size("abc", None).is_ok());
        assert!(check_prompt_size("abc", Some(3)).is_ok());
        let err = check_prompt_size(&"x".repeat(1500), Some(1000)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Prompt too large (1,500 characters). Maximum allowed: 1,000 characters. \
             Either increase max_prompt_chars in config or use a shorter document."
        );
    }

    #[test]
    fn test_missing_template_fails_construction() {
        let result = TaskRunner::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(MockGenerationBackend::new()),
            &PromptLibrary::default(),
            TaskKind::KeyReferences,
            TaskSettings::default(),
        );
        assert!(result.err().unwrap().is_config());
    }

    #[tokio::test]
    async fn test_success_writes_note_then_tag() {
        let store = store_with_pdf();
        let backend = MockGenerationBackend::new().with_fixed_response("A summary.");
        let runner = runner(store.clone(), backend.clone(), TaskSettings::default());

        let doc = store.document("P1").unwrap();
        let outcome = runner.run(&doc, true).await.unwrap();

        assert_eq!(outcome.state, TaskState::Succeeded);
        assert!(outcome.has_fulltext);
        assert_eq!(outcome.fulltext_length, "We propose the Transformer.".len());
        assert!(outcome.note_created);
        assert!(outcome.tag_added);

        let notes = store.notes_of("P1");
        assert_eq!(notes.len(), 1);
        assert_eq!(
            notes[0].note_content(),
            "<h2>LLM Summary</h2><p><strong>Model:</strong> mock-model</p><pre>A summary.</pre>"
        );
        assert!(store.document("P1").unwrap().has_tag("llm_summary"));
        assert!(backend.get_calls()[0].prompt.contains("We propose the Transformer."));
    }

    #[tokio::test]
    async fn test_attachment_input_writes_to_parent() {
        let store = store_with_pdf();
        let runner = runner(store.clone(), MockGenerationBackend::new(), TaskSettings::default());

        let pdf = store.document("A1").unwrap();
        let outcome = runner.run(&pdf, true).await.unwrap();

        assert_eq!(outcome.document_id, "P1");
        assert_eq!(store.notes_of("P1").len(), 1);
        assert!(store.notes_of("A1").is_empty());
        assert!(store.document("P1").unwrap().has_tag("llm_summary"));
        assert!(!store.document("A1").unwrap().has_tag("llm_summary"));
    }

    #[tokio::test]
    async fn test_already_tagged_is_skipped_without_side_effects() {
        let store = Arc::new(
            InMemoryStore::new()
                .with_document(tagged_paper("P1", "Done", &[], &["LLM_Summary"]))
                .with_document(attachment("A1", "P1", PDF_CONTENT_TYPE))
                .with_fulltext("A1", "Text."),
        );
        let backend = MockGenerationBackend::new();
        let runner = runner(store.clone(), backend.clone(), TaskSettings::default());

        let doc = store.document("P1").unwrap();
        let outcome = runner.run(&doc, true).await.unwrap();
        assert_eq!(outcome.state, TaskState::SkippedAlreadyDone);
        assert_eq!(backend.generate_call_count(), 0);
        assert_eq!(store.write_count(), 0);

        // With skip disabled the task runs again
        let outcome = runner.run(&doc, false).await.unwrap();
        assert_eq!(outcome.state, TaskState::Succeeded);
    }

    #[tokio::test]
    async fn test_no_fulltext_is_skipped_unless_disabled() {
        let store = Arc::new(InMemoryStore::new().with_document(paper("P1", "No PDF", &[])));
        let backend = MockGenerationBackend::new();
        let doc = store.document("P1").unwrap();

        let outcome = runner(store.clone(), backend.clone(), TaskSettings::default())
            .run(&doc, true)
            .await
            .unwrap();
        assert_eq!(outcome.state, TaskState::SkippedNoText);
        assert_eq!(backend.generate_call_count(), 0);

        let settings = TaskSettings {
            include_fulltext: false,
            ..Default::default()
        };
        let outcome = runner(store.clone(), backend.clone(), settings)
            .run(&doc, true)
            .await
            .unwrap();
        assert_eq!(outcome.state, TaskState::Succeeded);
        assert!(!outcome.has_fulltext);
    }

    #[tokio::test]
    async fn test_prompt_too_large_fails_before_generation() {
        let store = store_with_pdf();
        let backend = MockGenerationBackend::new();
        let settings = TaskSettings {
            max_prompt_chars: Some(10),
            ..Default::default()
        };
        let doc = store.document("P1").unwrap();
        let err = runner(store.clone(), backend.clone(), settings)
            .run(&doc, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PromptTooLarge { max: 10, .. }));
        assert_eq!(backend.generate_call_count(), 0);
    }

    #[tokio::test]
    async fn test_note_failure_leaves_document_untagged() {
        let store = store_with_pdf();
        store.fail_on(StoreOp::CreateDocument, "P1");
        let doc = store.document("P1").unwrap();

        let outcome = runner(store.clone(), MockGenerationBackend::new(), TaskSettings::default())
            .run(&doc, true)
            .await
            .unwrap();
        assert_eq!(outcome.state, TaskState::Succeeded);
        assert!(!outcome.note_created);
        assert!(!outcome.tag_added);
        assert!(outcome.analysis.is_some());
        assert!(!store.document("P1").unwrap().has_tag("llm_summary"));
    }

    #[tokio::test]
    async fn test_tag_failure_is_reported_not_fatal() {
        let store = store_with_pdf();
        store.fail_on(StoreOp::UpdateDocument, "P1");
        let doc = store.document("P1").unwrap();

        let outcome = runner(store.clone(), MockGenerationBackend::new(), TaskSettings::default())
            .run(&doc, true)
            .await
            .unwrap();
        assert_eq!(outcome.state, TaskState::Succeeded);
        assert!(outcome.note_created);
        assert!(!outcome.tag_added);
    }

    #[tokio::test]
    async fn test_create_note_disabled_skips_note_and_tag() {
        let store = store_with_pdf();
        let settings = TaskSettings {
            create_note: false,
            ..Default::default()
        };
        let doc = store.document("P1").unwrap();
        let outcome = runner(store.clone(), MockGenerationBackend::new(), settings)
            .run(&doc, true)
            .await
            .unwrap();
        assert!(!outcome.note_created);
        assert!(!outcome.tag_added);
        assert!(store.notes_of("P1").is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_before_write_leaves_no_note() {
        let store = store_with_pdf();
        let runner = runner(store.clone(), MockGenerationBackend::new(), TaskSettings::default());
        runner.shutdown().trigger();

        let doc = store.document("P1").unwrap();
        let err = runner.run(&doc, true).await.unwrap_err();
        assert!(matches!(err, Error::Interrupted));
        assert!(store.notes_of("P1").is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_generation() {
        let store = store_with_pdf();
        let backend = MockGenerationBackend::new().with_latency_ms(30_000);
        let runner = runner(store.clone(), backend, TaskSettings::default());

        let shutdown = runner.shutdown().clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            shutdown.trigger();
        });

        let doc = store.document("P1").unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), runner.run(&doc, true))
            .await
            .expect("generation should be abandoned promptly");
        assert!(matches!(result, Err(Error::Interrupted)));
        assert!(store.notes_of("P1").is_empty());
        assert!(!store.document("P1").unwrap().has_tag("llm_summary"));
        assert_eq!(store.call_count(StoreOp::UpdateDocument), 0);
    }
}
