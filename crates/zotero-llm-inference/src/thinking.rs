//! Thinking-pattern removal for model responses.
//!
//! Reasoning models wrap their chain of thought in a variety of markers.
//! Everything inside a recognized marker is dropped before the response is
//! written anywhere. Matching is case-insensitive and spans lines.
//!
//! Recognized forms:
//! - XML-style blocks: `<thinking>`, `<thought>`, `<think>`, `<reasoning>`,
//!   `<analysis>`, `<consideration>`, `<internal_thought>`
//! - Bracketed blocks: `<|thinking|>...<|/thinking|>`, `[THINKING]...[/THINKING]`
//! - Fenced blocks opened with ```` ```thinking ````
//! - `**Thinking:**` and `Thinking:` paragraphs, up to the next blank line or
//!   the next labelled section

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use zotero_llm_core::defaults::EMPTY_RESPONSE;

/// Delimited blocks removed wholesale.
static BLOCK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)<thinking>.*?</thinking>",
        r"(?is)<thought>.*?</thought>",
        r"(?is)<think>.*?</think>",
        r"(?is)<reasoning>.*?</reasoning>",
        r"(?is)<analysis>.*?</analysis>",
        r"(?is)<consideration>.*?</consideration>",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid thinking pattern"))
    .collect()
});

/// Delimited blocks removed after the paragraph forms.
static LATE_BLOCK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?is)<\|thinking\|>.*?<\|/thinking\|>",
        r"(?is)\[THINKING\].*?\[/THINKING\]",
        r"(?is)```thinking.*?```",
        r"(?is)<internal_thought>.*?</internal_thought>",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid thinking pattern"))
    .collect()
});

static BOLD_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\*\*Thinking:\*\*").expect("valid thinking pattern"));

static BOLD_LABEL_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n\n|\*\*[A-Z]|\n\*\*").expect("valid thinking pattern"));

static PLAIN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Thinking:").expect("valid thinking pattern"));

static PLAIN_LABEL_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n\n|[A-Z][a-z]+:").expect("valid thinking pattern"));

static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").expect("valid newline pattern"));

/// Remove every recognized thinking pattern, then collapse runs of blank
/// lines and trim.
pub fn strip_thinking(content: &str) -> String {
    let mut cleaned = content.to_string();

    for pattern in BLOCK_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    cleaned = remove_labelled(&cleaned, &BOLD_LABEL, &BOLD_LABEL_END);
    cleaned = remove_labelled(&cleaned, &PLAIN_LABEL, &PLAIN_LABEL_END);

    for pattern in LATE_BLOCK_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    EXCESS_NEWLINES
        .replace_all(&cleaned, "\n\n")
        .trim()
        .to_string()
}

/// Remove each `label` occurrence together with the text that follows it,
/// up to (not including) the first `terminator` match or the end of input.
fn remove_labelled(text: &str, label: &Regex, terminator: &Regex) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(m) = label.find_at(text, pos) {
        out.push_str(&text[pos..m.start()]);
        pos = terminator
            .find_at(text, m.end())
            .map(|t| t.start())
            .unwrap_or(text.len());
    }

    out.push_str(&text[pos..]);
    out
}

/// Turn a raw completion into the text callers see.
///
/// Empty content becomes the fixed `No response generated` marker; anything
/// else is stripped of thinking patterns.
pub fn clean_response(provider: &str, content: Option<&str>) -> String {
    let content = content.unwrap_or_default();
    if content.trim().is_empty() {
        warn!(
            subsystem = "inference",
            component = provider,
            "Empty response from LLM"
        );
        return EMPTY_RESPONSE.to_string();
    }

    let cleaned = strip_thinking(content);
    if cleaned.len() != content.len() {
        debug!(
            subsystem = "inference",
            component = provider,
            before = content.len(),
            after = cleaned.len(),
            "Removed thinking patterns"
        );
    }
    cleaned
}
