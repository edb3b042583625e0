//! Core traits for zotero-llm abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// DOCUMENT STORE TRAITS
// =============================================================================

/// Remote reference library holding documents, collections, and notes.
///
/// Identifiers are opaque strings. Updates replace the whole record, so
/// callers read, modify, then write.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a single record by key.
    async fn get_document(&self, id: &str) -> Result<Document>;

    /// Child attachments and notes of a record.
    async fn children(&self, id: &str) -> Result<Vec<Document>>;

    /// Every collection in the library.
    async fn list_collections(&self) -> Result<Vec<Collection>>;

    /// Top-level records filed directly in a collection, including
    /// standalone notes.
    async fn collection_documents(&self, collection_id: &str) -> Result<Vec<Document>>;

    /// Create a collection, optionally under a parent. Returns the new key.
    async fn create_collection(&self, name: &str, parent_id: Option<&str>) -> Result<String>;

    /// Create a record. Returns the new key.
    async fn create_document(&self, doc: NewDocument) -> Result<String>;

    /// Replace a record with the given contents.
    async fn update_document(&self, doc: &Document) -> Result<()>;

    /// Every record in the library, in as few round trips as the store allows.
    async fn all_documents(&self) -> Result<Vec<Document>>;

    /// Every collection in the library, in as few round trips as the store allows.
    async fn all_collections(&self) -> Result<Vec<Collection>> {
        self.list_collections().await
    }

    /// Indexed full text of an attachment, if the store has any.
    async fn fulltext(&self, attachment_id: &str) -> Result<Option<String>>;

    /// Quick search over titles and creators, excluding attachments.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>>;
}

// =============================================================================
// INFERENCE BACKEND TRAITS
// =============================================================================

/// Per-call generation options. Unset fields fall back to backend
/// defaults and are never sent to the provider when both are unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub min_p: Option<f32>,
    pub timeout: Option<Duration>,
}

impl GenerationOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fill unset fields from `defaults`.
    pub fn or(&self, defaults: &GenerationOptions) -> GenerationOptions {
        GenerationOptions {
            model: self.model.clone().or_else(|| defaults.model.clone()),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            temperature: self.temperature.or(defaults.temperature),
            top_p: self.top_p.or(defaults.top_p),
            top_k: self.top_k.or(defaults.top_k),
            min_p: self.min_p.or(defaults.min_p),
            timeout: self.timeout.or(defaults.timeout),
        }
    }
}

/// Backend for text generation (prompt in, text out).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion with backend defaults.
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_options(prompt, &GenerationOptions::default())
            .await
    }

    /// Generate a completion with per-call overrides.
    async fn generate_with_options(&self, prompt: &str, options: &GenerationOptions)
        -> Result<String>;

    /// Get the model name used for generation.
    fn model_name(&self) -> &str;

    /// Base per-call timeout.
    fn timeout(&self) -> Duration;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_or_prefers_call_values() {
        let defaults = GenerationOptions {
            model: Some("base".to_string()),
            max_tokens: Some(1000),
            temperature: Some(0.7),
            timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        let call = GenerationOptions::default().with_timeout(Duration::from_secs(180));

        let merged = call.or(&defaults);
        assert_eq!(merged.model.as_deref(), Some("base"));
        assert_eq!(merged.max_tokens, Some(1000));
        assert_eq!(merged.timeout, Some(Duration::from_secs(180)));
        assert_eq!(merged.top_k, None);
        assert_eq!(merged.min_p, None);
    }

    struct EchoBackend;

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        async fn generate_with_options(
            &self,
            prompt: &str,
            options: &GenerationOptions,
        ) -> Result<String> {
            Ok(format!("{}|{:?}", prompt, options.timeout))
        }

        fn model_name(&self) -> &str {
            "echo"
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    #[tokio::test]
    async fn test_generate_uses_default_options() {
        let backend = EchoBackend;
        let out = backend.generate("hi").await.unwrap();
        assert_eq!(out, "hi|None");
    }
}
