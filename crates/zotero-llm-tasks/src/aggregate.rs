//! Summary QA: answer one question from the summaries of a whole collection.
//!
//! Collects the `LLM Summary` notes (and optionally `Key References` notes)
//! of every document under a collection, asks the model once with an
//! extended timeout, and appends the titled answer to the `LLM QA` note of
//! `LLM QA/<root collection name>`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use zotero_llm_core::defaults::{
    AGGREGATION_TIMEOUT_FLOOR_SECS, AGGREGATION_TIMEOUT_MULTIPLIER, DEFAULT_QA_TITLE,
    QA_COLLECTION, QA_NOTE_TITLE, QA_TAG, QA_TITLE_MAX_CHARS,
};
use zotero_llm_core::{Document, DocumentStore, GenerationBackend, GenerationOptions, Result};

use crate::coordinator::SkipEntry;
use crate::merger::{has_title, note_body, AnnotationMerger, NoteTarget};
use crate::prompts::PromptLibrary;
use crate::resolver::{split_path, PathResolver};
use crate::runner::check_prompt_size;
use crate::source::DocumentSource;
use crate::task::TaskKind;

/// Prompt key for overriding the aggregation instructions.
pub const SUMMARY_QA_PROMPT_KEY: &str = "summary_qa";

/// Default aggregation instructions.
pub const DEFAULT_SUMMARY_QA_PROMPT: &str = "You are a research assistant. Answer the question \
below using only the paper summaries provided. Cite papers by title where relevant.\n\n\
Respond in exactly this format:\n\
TITLE: <a short descriptive title for this answer>\n\
ANSWER: <your answer>";

pub const NO_SUMMARY_REASON: &str = "No LLM summary available";
pub const MISSING_NOTE_REASON: &str = "LLM summary tag present but no note content found";

/// The `tasks.summary_qa` configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSettings {
    #[serde(default)]
    pub max_prompt_chars: Option<usize>,
}

/// Outcome of one summary QA run.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationResult {
    pub collection_path: String,
    pub question: String,
    pub target_collection: String,
    pub qa_title: String,
    pub answer: String,
    pub qa_created: bool,
    pub appended: bool,
    pub items_total: usize,
    pub items_with_summaries: usize,
    pub items_processed: Vec<String>,
    pub items_skipped: Vec<SkipEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Timeout for the aggregation call: at least three times the base
/// timeout and never under three minutes.
pub fn aggregation_timeout(base: Duration) -> Duration {
    let floor = Duration::from_secs(AGGREGATION_TIMEOUT_FLOOR_SECS);
    (base * AGGREGATION_TIMEOUT_MULTIPLIER).max(floor)
}

/// Shorten an over-long title to the maximum length, ending in `...`.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() <= QA_TITLE_MAX_CHARS {
        return title.to_string();
    }
    let kept: String = title.chars().take(QA_TITLE_MAX_CHARS - 3).collect();
    format!("{}...", kept)
}

/// Split a `TITLE:` / `ANSWER:` response. Without both markers the whole
/// response is the answer under the default title.
pub fn parse_answer(response: &str) -> (String, String) {
    let title_at = response.find("TITLE:");
    let answer_at = response.find("ANSWER:");

    match (title_at, answer_at) {
        (Some(t), Some(a)) if t < a => {
            let title = response[t + "TITLE:".len()..a].trim();
            let answer = response[a + "ANSWER:".len()..].trim();
            let title = if title.is_empty() {
                DEFAULT_QA_TITLE.to_string()
            } else {
                truncate_title(title)
            };
            (title, answer.to_string())
        }
        _ => (DEFAULT_QA_TITLE.to_string(), response.trim().to_string()),
    }
}

struct PaperSummary {
    document: Document,
    summary: String,
    references: Option<String>,
}

enum SummaryLookup {
    Found(PaperSummary),
    Skipped(String),
}

/// Collection-wide question answering over existing summaries.
pub struct AggregationPipeline {
    store: Arc<dyn DocumentStore>,
    backend: Arc<dyn GenerationBackend>,
    resolver: PathResolver,
    source: DocumentSource,
    merger: AnnotationMerger,
    instructions: String,
    settings: AggregationSettings,
}

impl AggregationPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        backend: Arc<dyn GenerationBackend>,
        prompts: &PromptLibrary,
        settings: AggregationSettings,
    ) -> Self {
        let instructions = prompts
            .template(SUMMARY_QA_PROMPT_KEY)
            .unwrap_or(DEFAULT_SUMMARY_QA_PROMPT)
            .to_string();
        Self {
            resolver: PathResolver::new(store.clone()),
            source: DocumentSource::new(store.clone()),
            merger: AnnotationMerger::new(store.clone()),
            store,
            backend,
            instructions,
            settings,
        }
    }

    /// Answer `question` from the summaries under `collection_path`.
    ///
    /// Resolution and generation failures are returned as errors. A failed
    /// note write is reported in the result with `qa_created = false`.
    #[instrument(skip(self, question), fields(subsystem = "tasks", component = "aggregate"))]
    pub async fn answer(
        &self,
        collection_path: &str,
        question: &str,
        include_references: bool,
    ) -> Result<AggregationResult> {
        let (collection_id, canonical_path) =
            self.resolver.resolve_canonical(collection_path).await?;
        let documents = self.source.documents_in(&collection_id, true).await?;
        // Stored spelling, so differently-cased requests share one QA note
        let first_segment = split_path(&canonical_path)
            .first()
            .map(|s| s.to_string())
            .unwrap_or_default();

        let mut result = AggregationResult {
            collection_path: collection_path.to_string(),
            question: question.to_string(),
            target_collection: format!("{}/{}", QA_COLLECTION, first_segment),
            qa_title: String::new(),
            answer: String::new(),
            qa_created: false,
            appended: false,
            items_total: documents.len(),
            items_with_summaries: 0,
            items_processed: Vec::new(),
            items_skipped: Vec::new(),
            error: None,
        };

        let mut papers = Vec::new();
        for document in documents {
            match self.lookup_summary(document.clone(), include_references).await {
                SummaryLookup::Found(paper) => {
                    result.items_processed.push(paper.document.display_title().to_string());
                    papers.push(paper);
                }
                SummaryLookup::Skipped(reason) => {
                    result.items_skipped.push(SkipEntry {
                        document_id: document.key.clone(),
                        title: document.display_title().to_string(),
                        reason,
                    });
                }
            }
        }
        result.items_with_summaries = papers.len();

        if papers.is_empty() {
            warn!(collection_path, "No summaries found");
            result.error = Some(format!(
                "No documents with LLM summaries found in '{}'",
                collection_path
            ));
            return Ok(result);
        }

        let prompt = self.build_prompt(collection_path, question, &papers);
        check_prompt_size(&prompt, self.settings.max_prompt_chars)?;

        let timeout = aggregation_timeout(self.backend.timeout());
        let options = GenerationOptions::default().with_timeout(timeout);
        let start = Instant::now();
        let response = self.backend.generate_with_options(&prompt, &options).await?;
        info!(
            prompt_len = prompt.len(),
            response_len = response.len(),
            timeout_secs = timeout.as_secs(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Aggregated answer generated"
        );

        let (title, answer) = parse_answer(&response);
        result.qa_title = title;
        result.answer = answer;

        match self.save(&result, papers.len()).await {
            Ok(appended) => {
                result.qa_created = true;
                result.appended = appended;
            }
            Err(e) => {
                warn!(error = %e, "Failed to save QA note");
                result.error = Some(e.to_string());
            }
        }

        Ok(result)
    }

    async fn lookup_summary(&self, document: Document, include_references: bool) -> SummaryLookup {
        let summary_task = TaskKind::LlmSummary;
        if !document.has_tag(summary_task.tag()) {
            return SummaryLookup::Skipped(NO_SUMMARY_REASON.to_string());
        }

        let notes: Vec<Document> = match self.store.children(&document.key).await {
            Ok(children) => children.into_iter().filter(Document::is_note).collect(),
            Err(e) => return SummaryLookup::Skipped(format!("Failed to read notes: {}", e)),
        };

        let find_body = |title: &str| {
            notes
                .iter()
                .filter(|n| has_title(n.note_content(), title))
                .map(|n| note_body(n.note_content()))
                .find(|body| !body.is_empty())
                .map(str::to_string)
        };

        let Some(summary) = find_body(summary_task.note_title()) else {
            return SummaryLookup::Skipped(MISSING_NOTE_REASON.to_string());
        };

        let references_task = TaskKind::KeyReferences;
        let references = if include_references && document.has_tag(references_task.tag()) {
            find_body(references_task.note_title())
        } else {
            None
        };

        SummaryLookup::Found(PaperSummary {
            document,
            summary,
            references,
        })
    }

    fn build_prompt(&self, collection_path: &str, question: &str, papers: &[PaperSummary]) -> String {
        let mut prompt = format!(
            "{}\n\nCollection: {}\nQuestion: {}\n\nPapers ({}):\n",
            self.instructions,
            collection_path,
            question,
            papers.len()
        );
        for (i, paper) in papers.iter().enumerate() {
            prompt.push_str(&format!(
                "\n--- Paper {} ---\nTitle: {}\nAuthors: {}\nSummary:\n{}\n",
                i + 1,
                paper.document.display_title(),
                paper.document.author_names(),
                paper.summary
            ));
            if let Some(ref references) = paper.references {
                prompt.push_str(&format!("Key References:\n{}\n", references));
            }
        }
        prompt
    }

    /// Write the answer block. Returns whether it was appended.
    async fn save(&self, result: &AggregationResult, sources: usize) -> Result<bool> {
        let target_id = self
            .resolver
            .resolve_or_create(&result.target_collection)
            .await?;
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let block = format!(
            "<h3>{} - {}</h3>\n<h3>Q: {}</h3>\n<pre>\n{}\n\nSources: {} papers from {}\nModel: {}\n</pre>\n",
            result.qa_title,
            timestamp,
            result.question,
            result.answer,
            sources,
            result.collection_path,
            self.backend.model_name()
        );

        let outcome = self
            .merger
            .append_or_create(
                &NoteTarget::Collection(target_id),
                QA_NOTE_TITLE,
                &block,
                self.backend.model_name(),
                &[QA_TAG],
            )
            .await?;
        Ok(outcome.appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregation_timeout_floor_and_multiplier() {
        assert_eq!(aggregation_timeout(Duration::from_secs(30)), Duration::from_secs(180));
        assert_eq!(aggregation_timeout(Duration::from_secs(60)), Duration::from_secs(180));
        assert_eq!(aggregation_timeout(Duration::from_secs(120)), Duration::from_secs(360));
    }

    #[test]
    fn test_parse_answer_with_markers() {
        let (title, answer) = parse_answer("TITLE: Attention variants\nANSWER: They differ in cost.\n");
        assert_eq!(title, "Attention variants");
        assert_eq!(answer, "They differ in cost.");
    }

    #[test]
    fn test_parse_answer_without_markers_falls_back() {
        let (title, answer) = parse_answer("  Just an answer.  ");
        assert_eq!(title, DEFAULT_QA_TITLE);
        assert_eq!(answer, "Just an answer.");

        let (title, _) = parse_answer("ANSWER: first\nTITLE: backwards");
        assert_eq!(title, DEFAULT_QA_TITLE);
    }

    #[test]
    fn test_long_title_truncated_to_fifty_chars() {
        let long = "A".repeat(80);
        let (title, _) = parse_answer(&format!("TITLE: {}\nANSWER: x", long));
        assert_eq!(title.chars().count(), 50);
        assert!(title.ends_with("..."));
        assert_eq!(truncate_title("Short"), "Short");
    }

    #[test]
    fn test_truncated_title_keeps_length_across_word_break() {
        let title = format!("{} {}", "A".repeat(46), "B".repeat(20));
        let truncated = truncate_title(&title);
        assert_eq!(truncated.chars().count(), 50);
        assert_eq!(truncated, format!("{} B...", "A".repeat(46)));
    }
}
