//! Error types for zotero-llm.

use std::borrow::Borrow;

use thiserror::Error;

/// Result type alias using zotero-llm's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for zotero-llm operations.
///
/// Variants fall into the categories the orchestrator cares about:
/// configuration errors abort a whole invocation, everything else is
/// scoped to a single document or a single collection path.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Task name is not one of the built-in tasks
    #[error("Unknown task: {0} (valid tasks: llm_summary, key_references)")]
    UnknownTask(String),

    /// Collection path did not resolve to a collection
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Resource not found in the document store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Assembled prompt exceeds the configured maximum
    #[error(
        "Prompt too large ({} characters). Maximum allowed: {} characters. \
         Either increase max_prompt_chars in config or use a shorter document.",
        format_count(.actual),
        format_count(.max)
    )]
    PromptTooLarge { actual: usize, max: usize },

    /// Paid provider rejected the request for lack of balance (HTTP 402)
    #[error("Insufficient credits on {0}; check your account balance")]
    InsufficientCredits(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Document store returned an error
    #[error("Store error: {0}")]
    Store(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Run was interrupted before this unit of work completed
    #[error("Interrupted")]
    Interrupted,

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must abort the whole invocation.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_) | Error::UnknownTask(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

/// Format a count with `,` thousands separators.
pub fn format_count(n: impl Borrow<usize>) -> String {
    let digits = n.borrow().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
