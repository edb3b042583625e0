//! Tag normalization.
//!
//! Idempotence and flag tags are compared as trimmed lowercase strings so
//! that `LLM_Summary` and `llm_summary` mark the same state.

/// Normalize a tag for storage and comparison.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("  LLM_Summary "), "llm_summary");
        assert_eq!(normalize_tag("key_references"), "key_references");
        assert_eq!(normalize_tag(""), "");
    }
}
