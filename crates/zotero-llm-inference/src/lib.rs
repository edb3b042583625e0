//! # zotero-llm-inference
//!
//! LLM inference backends for zotero-llm.
//!
//! This crate provides:
//! - OpenAI-compatible backend (local servers, OpenAI, OpenRouter)
//! - Anthropic Messages API backend
//! - Provider configuration, validation, and backend construction
//! - Thinking-pattern removal applied to every response
//! - Mock backend for tests (feature `mock`)
//!
//! # Feature Flags
//!
//! - `mock`: Enable [`mock::MockGenerationBackend`] outside this crate's tests
//!
//! # Example
//!
//! ```rust,no_run
//! use zotero_llm_inference::{create_backend, LlmConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LlmConfig {
//!         provider: "local".to_string(),
//!         model: "qwen3-8b".to_string(),
//!         port: Some(1234),
//!         ..Default::default()
//!     };
//!     let backend = create_backend(&config).unwrap();
//!     let answer = backend.generate("Hello").await.unwrap();
//!     println!("{}", answer);
//! }
//! ```

pub mod anthropic;
pub mod config;
pub mod openai;
pub mod provider;
pub mod thinking;

// Mock generation backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use zotero_llm_core::{Error, GenerationBackend, GenerationOptions, Result};

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use config::{LlmConfig, Provider};
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use provider::create_backend;
pub use thinking::{clean_response, strip_thinking};
