//! Centralized default constants for zotero-llm.
//!
//! **This module is the single source of truth** for shared default values.
//! Organized by domain area.

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// Zotero Web API root.
pub const ZOTERO_API_URL: &str = "https://api.zotero.org";

/// Zotero Web API version sent on every request.
pub const ZOTERO_API_VERSION: &str = "3";

/// Page size for paginated bulk listings (the API maximum).
pub const PAGE_LIMIT: usize = 100;

/// Default result count for search-by-query.
pub const SEARCH_LIMIT: usize = 25;

/// Store request timeout in seconds.
pub const STORE_TIMEOUT_SECS: u64 = 30;

/// MIME type of attachments that carry extractable full text.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

// =============================================================================
// INFERENCE
// =============================================================================

/// Per-call LLM timeout in seconds.
pub const LLM_TIMEOUT_SECS: u64 = 60;

/// OpenRouter routes to slower upstreams; its base timeout is doubled.
pub const OPENROUTER_TIMEOUT_SECS: u64 = 120;

/// Returned in place of an empty completion.
pub const EMPTY_RESPONSE: &str = "No response generated";

/// Anthropic requires `max_tokens`; used when the config leaves it unset.
pub const ANTHROPIC_MAX_TOKENS: u32 = 4096;

// =============================================================================
// BATCH PROCESSING
// =============================================================================

/// Capacity of the batch progress event channel.
pub const BATCH_EVENT_CAPACITY: usize = 256;

/// Idempotence tag of the summary task; the aggregation pipeline reads it.
pub const SUMMARY_TAG: &str = "llm_summary";

/// Idempotence tag of the key references task.
pub const KEY_REFERENCES_TAG: &str = "key_references";

// =============================================================================
// AGGREGATION (SUMMARY QA)
// =============================================================================

/// Aggregation timeout is at least this multiple of the base timeout.
pub const AGGREGATION_TIMEOUT_MULTIPLIER: u32 = 3;

/// Aggregation timeout floor in seconds.
pub const AGGREGATION_TIMEOUT_FLOOR_SECS: u64 = 180;

/// Parsed answer titles longer than this are truncated with an ellipsis.
pub const QA_TITLE_MAX_CHARS: usize = 50;

/// Title used when the model's answer has no `TITLE:` section.
pub const DEFAULT_QA_TITLE: &str = "Summary QA";

/// Top-level collection that receives aggregated answers.
pub const QA_COLLECTION: &str = "LLM QA";

/// Title marker of QA notes.
pub const QA_NOTE_TITLE: &str = "LLM QA";

/// Tag on notes written by the aggregation pipeline.
pub const QA_TAG: &str = "llm_qa";

// =============================================================================
// RECONCILIATION
// =============================================================================

/// Flag tag for records without a PDF attachment.
pub const MISSING_PDF_TAG: &str = "missing_pdf";

// =============================================================================
// INTERACTIVE QA SESSION
// =============================================================================

/// Candidate pool fetched from the store before fuzzy ranking.
pub const CHAT_SEARCH_POOL: usize = 50;

/// Ranked results shown to the user.
pub const CHAT_SEARCH_RESULTS: usize = 10;
