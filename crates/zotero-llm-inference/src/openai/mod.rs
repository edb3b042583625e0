//! OpenAI-compatible inference backend.
//!
//! This module provides an inference backend that works with any
//! OpenAI-compatible chat-completions endpoint, including:
//!
//! - OpenAI cloud API
//! - OpenRouter (with attribution headers)
//! - LM Studio, Ollama, llama.cpp, vLLM on localhost
//!
//! # Example
//!
//! ```rust,no_run
//! use zotero_llm_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use zotero_llm_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::new(OpenAIConfig::local(1234, "qwen3-8b")).unwrap();
//!     let answer = backend.generate("Summarize this abstract: ...").await.unwrap();
//!     println!("{}", answer);
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_GEN_MODEL, DEFAULT_OPENAI_URL, DEFAULT_OPENROUTER_URL,
    OPENROUTER_REFERER, OPENROUTER_TITLE,
};
pub(crate) use backend::{error_from_response, send_error};
pub use error::{to_core_error, OpenAIErrorCode};
pub use types::*;
