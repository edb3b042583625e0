//! # zotero-llm-core
//!
//! Core types, traits, and abstractions for zotero-llm.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other zotero-llm crates depend on.

pub mod defaults;
pub mod error;
pub mod models;
pub mod tags;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{format_count, Error, Result};
pub use models::*;
pub use tags::normalize_tag;
pub use traits::*;
