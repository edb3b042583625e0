//! # zotero-llm-store
//!
//! Document store layer for zotero-llm.
//!
//! This crate provides:
//! - Zotero Web API v3 client implementing [`DocumentStore`]
//! - Connection configuration and validation
//! - In-memory store and fixtures for tests (feature `memory`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use zotero_llm_store::{ZoteroClient, ZoteroConfig};
//! use zotero_llm_core::DocumentStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ZoteroClient::new(&ZoteroConfig::new("123456", "api-key"))?;
//!     for collection in client.list_collections().await? {
//!         println!("{}", collection.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

// Test fixtures for integration tests in downstream crates
#[cfg(any(test, feature = "memory"))]
pub mod test_fixtures;

// Re-export core types
pub use zotero_llm_core::{Collection, Document, DocumentStore, NewDocument};

pub use client::ZoteroClient;
pub use config::{LibraryType, ZoteroConfig};
