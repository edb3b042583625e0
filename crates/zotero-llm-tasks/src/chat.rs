//! Interactive question answering over a single paper.
//!
//! A [`QaSession`] holds the paper context and the conversation so far.
//! Terminal I/O lives in the CLI; this module only builds prompts, records
//! history, and saves the transcript as a `LLM QA` child note.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use similar::TextDiff;
use tracing::{info, instrument};

use zotero_llm_core::defaults::{CHAT_SEARCH_POOL, CHAT_SEARCH_RESULTS, QA_NOTE_TITLE};
use zotero_llm_core::{Document, DocumentStore, Error, GenerationBackend, Result};

use crate::merger::{AnnotationMerger, MergeOutcome, NoteTarget};
use crate::prompts::PromptLibrary;
use crate::source::DocumentSource;
use crate::target::canonical_target;

/// Search the library and rank regular documents by title similarity.
pub async fn search_papers(store: &dyn DocumentStore, query: &str) -> Result<Vec<Document>> {
    let query_lower = query.trim().to_lowercase();
    let mut scored: Vec<(f32, Document)> = store
        .search(query.trim(), CHAT_SEARCH_POOL)
        .await?
        .into_iter()
        .filter(Document::is_regular)
        .map(|d| {
            let title_lower = d.title.to_lowercase();
            let score = TextDiff::from_chars(query_lower.as_str(), title_lower.as_str()).ratio();
            (score, d)
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    Ok(scored
        .into_iter()
        .take(CHAT_SEARCH_RESULTS)
        .map(|(_, d)| d)
        .collect())
}

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

/// Transcript block appended to the paper's QA note.
pub fn session_block(history: &[Exchange], model: &str, timestamp: &str) -> String {
    let first = history.first().map(|e| e.question.as_str()).unwrap_or_default();
    let mut block = format!(
        "<h3>Q&A Session - {}</h3>\n<h3>Q: {}</h3>\n<pre>\n",
        timestamp, first
    );
    for exchange in history {
        block.push_str(&format!(
            "User: {}\n\nLLM: {}\n\n",
            exchange.question, exchange.answer
        ));
    }
    block.push_str(&format!("\nModel: {}\n</pre>\n", model));
    block
}

/// A conversation about one paper.
pub struct QaSession {
    store: Arc<dyn DocumentStore>,
    backend: Arc<dyn GenerationBackend>,
    merger: AnnotationMerger,
    system_prompt: String,
    paper: Document,
    fulltext: Option<String>,
    history: Vec<Exchange>,
}

impl QaSession {
    /// Load the paper's full text and start an empty conversation.
    /// A paper without text still gets a session over its metadata.
    pub async fn load(
        store: Arc<dyn DocumentStore>,
        backend: Arc<dyn GenerationBackend>,
        prompts: &PromptLibrary,
        paper: Document,
    ) -> Result<Self> {
        let fulltext = DocumentSource::new(store.clone()).fulltext_for(&paper).await;
        info!(
            subsystem = "tasks",
            component = "chat",
            document_id = %paper.key,
            has_fulltext = fulltext.is_some(),
            "QA session loaded"
        );
        Ok(Self {
            merger: AnnotationMerger::new(store.clone()),
            store,
            backend,
            system_prompt: prompts.qa_system_prompt().to_string(),
            paper,
            fulltext,
            history: Vec::new(),
        })
    }

    pub fn paper(&self) -> &Document {
        &self.paper
    }

    pub fn has_fulltext(&self) -> bool {
        self.fulltext.is_some()
    }

    /// Word count of the full text.
    pub fn word_count(&self) -> usize {
        self.fulltext
            .as_deref()
            .map(|t| t.split_whitespace().count())
            .unwrap_or(0)
    }

    /// Rough token estimate for display.
    pub fn estimated_tokens(&self) -> usize {
        self.word_count() * 3 / 4
    }

    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    fn paper_context(&self) -> String {
        format!(
            "Research Paper Details:\nTitle: {}\nAuthors: {}\nAbstract: {}\n\nFull Text:\n{}\n",
            self.paper.display_title(),
            self.paper.author_names(),
            self.paper.abstract_note,
            self.fulltext.as_deref().unwrap_or_default()
        )
    }

    fn prompt_for(&self, question: &str) -> String {
        let history = if self.history.is_empty() {
            "(No previous conversation)".to_string()
        } else {
            self.history
                .iter()
                .map(|e| format!("Q: {}\n\nA: {}", e.question, e.answer))
                .collect::<Vec<_>>()
                .join("\n\n")
        };
        format!(
            "{}\n\n{}\n\nPrevious conversation:\n{}\n\nUser question: {}\n\n\
             Please provide a helpful answer based on the paper content above.",
            self.system_prompt,
            self.paper_context(),
            history,
            question
        )
    }

    /// Ask a question. The exchange is recorded only when generation succeeds.
    #[instrument(skip(self, question), fields(subsystem = "tasks", component = "chat", document_id = %self.paper.key))]
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        let prompt = self.prompt_for(question);
        let answer = self.backend.generate(&prompt).await?;
        self.history.push(Exchange {
            question: question.to_string(),
            answer: answer.clone(),
        });
        Ok(answer)
    }

    /// Append the transcript to the paper's `LLM QA` note, creating it if needed.
    pub async fn save(&self) -> Result<MergeOutcome> {
        if self.history.is_empty() {
            return Err(Error::InvalidInput(
                "No questions asked in this session".to_string(),
            ));
        }

        let target = canonical_target(self.store.as_ref(), &self.paper).await?;
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let block = session_block(&self.history, self.model_name(), &timestamp);

        self.merger
            .append_or_create(
                &NoteTarget::Document(target.key),
                QA_NOTE_TITLE,
                &block,
                self.model_name(),
                &[],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zotero_llm_inference::mock::MockGenerationBackend;
    use zotero_llm_store::memory::InMemoryStore;
    use zotero_llm_store::test_fixtures::{attachment, paper};

    fn library() -> InMemoryStore {
        InMemoryStore::new()
            .with_document(paper("P1", "Attention Is All You Need", &[]))
            .with_document(paper("P2", "Attention Mechanisms Survey", &[]))
            .with_document(paper("P3", "Graph Neural Networks", &[]))
            .with_document(attachment("A1", "P1", "application/pdf"))
            .with_fulltext("A1", "We propose the Transformer architecture.")
    }

    #[tokio::test]
    async fn test_search_ranks_by_title_similarity() {
        let store = library();
        let hits = search_papers(&store, "Attention").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key, "P1");
    }

    #[tokio::test]
    async fn test_ask_carries_history_into_next_prompt() {
        let store: Arc<dyn DocumentStore> = Arc::new(library());
        let backend = Arc::new(MockGenerationBackend::new().with_fixed_response("An answer."));
        let paper = store.get_document("P1").await.unwrap();
        let mut session = QaSession::load(store, backend.clone(), &PromptLibrary::default(), paper)
            .await
            .unwrap();
        assert!(session.has_fulltext());
        assert_eq!(session.word_count(), 5);

        session.ask("What is proposed?").await.unwrap();
        session.ask("Why?").await.unwrap();

        let calls = backend.get_calls();
        assert!(calls[0].prompt.contains("(No previous conversation)"));
        assert!(calls[0].prompt.contains("Transformer architecture"));
        assert!(calls[1].prompt.contains("Q: What is proposed?\n\nA: An answer."));
        assert!(calls[1].prompt.contains("User question: Why?"));
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_question_not_recorded() {
        let store: Arc<dyn DocumentStore> = Arc::new(library());
        let backend = Arc::new(MockGenerationBackend::new().with_failure_containing("explode"));
        let paper = store.get_document("P3").await.unwrap();
        let mut session = QaSession::load(store, backend, &PromptLibrary::default(), paper)
            .await
            .unwrap();
        assert!(!session.has_fulltext());

        assert!(session.ask("please explode").await.is_err());
        assert!(session.history().is_empty());
        assert!(matches!(session.save().await, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_session_block_layout() {
        let history = vec![
            Exchange {
                question: "First?".to_string(),
                answer: "One.".to_string(),
            },
            Exchange {
                question: "Second?".to_string(),
                answer: "Two.".to_string(),
            },
        ];
        let block = session_block(&history, "qwen3-8b", "2024-01-01 10:00:00");
        assert!(block.starts_with("<h3>Q&A Session - 2024-01-01 10:00:00</h3>\n<h3>Q: First?</h3>\n<pre>\n"));
        assert!(block.contains("User: First?\n\nLLM: One.\n\nUser: Second?\n\nLLM: Two.\n\n"));
        assert!(block.ends_with("\nModel: qwen3-8b\n</pre>\n"));
    }
}
