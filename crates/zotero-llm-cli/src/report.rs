//! Human-readable and JSON rendering of run results.

use std::fmt::Write;

use serde::Serialize;

use zotero_llm_tasks::{
    AggregationResult, BatchReport, ReconcileReport, ScopeReport, TaskOutcome, TaskState,
};

const RULE: &str = "============================================================";

/// Pretty-printed JSON for `--json`.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Single-document result, without batch framing.
pub fn render_outcome(outcome: &TaskOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "{} ({})", outcome.title, outcome.document_id);
    let _ = writeln!(out, "{}", RULE);

    match outcome.state {
        TaskState::SkippedAlreadyDone | TaskState::SkippedNoText => {
            let _ = writeln!(
                out,
                "Skipped: {}",
                outcome.skip_reason.as_deref().unwrap_or_default()
            );
        }
        TaskState::Failed => {
            let _ = writeln!(out, "Failed: {}", outcome.error.as_deref().unwrap_or_default());
        }
        TaskState::Succeeded => {
            if outcome.has_fulltext {
                let _ = writeln!(out, "Full text: {} characters", outcome.fulltext_length);
            } else {
                let _ = writeln!(out, "Full text: not used");
            }
            let _ = writeln!(out, "Note created: {}", yes_no(outcome.note_created));
            let _ = writeln!(out, "Tag added: {}", yes_no(outcome.tag_added));
            if let Some(ref analysis) = outcome.analysis {
                let _ = writeln!(out, "\n{}", analysis);
            }
        }
    }
    out
}

/// Batch totals plus itemized skips and failures.
pub fn render_batch(report: &BatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Task: {}", report.task);
    let _ = writeln!(out, "Total: {}", report.total);
    let _ = writeln!(out, "Succeeded: {}", report.succeeded);
    let _ = writeln!(out, "Failed: {}", report.failed);
    let _ = writeln!(
        out,
        "Skipped: {} ({} already done, {} without text)",
        report.skipped(),
        report.skipped_already_done,
        report.skipped_no_text
    );
    if report.interrupted {
        let _ = writeln!(
            out,
            "Interrupted after {} of {} documents",
            report.processed(),
            report.total
        );
    }

    if !report.skips.is_empty() {
        let _ = writeln!(out, "\nSkipped documents:");
        for skip in &report.skips {
            let _ = writeln!(out, "  - {} ({}): {}", skip.title, skip.document_id, skip.reason);
        }
    }
    if !report.failures.is_empty() {
        let _ = writeln!(out, "\nFailed documents:");
        for failure in &report.failures {
            let _ = writeln!(
                out,
                "  - {} ({}): {}",
                failure.title, failure.document_id, failure.error
            );
        }
    }
    let _ = writeln!(out, "{}", RULE);
    out
}

/// One section per collection path.
pub fn render_scopes(reports: &[ScopeReport]) -> String {
    let mut out = String::new();
    for scope in reports {
        let _ = writeln!(out, "\nCollection: {}", scope.path);
        if let Some(ref error) = scope.error {
            let _ = writeln!(out, "  Error: {}", error);
        }
        if let Some(ref batch) = scope.batch {
            out.push_str(&render_batch(batch));
        }
    }
    out
}

pub fn render_reconcile(report: &ReconcileReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Flag: {}", report.flag_tag);
    let _ = writeln!(out, "Items with PDFs: {}", report.items_with_pdfs);
    let _ = writeln!(out, "Items without PDFs: {}", report.items_without_pdfs);
    let _ = writeln!(out, "Flags added: {}", report.flags_added);
    let _ = writeln!(out, "Flags removed: {}", report.flags_removed);
    let _ = writeln!(out, "Errors: {}", report.errors);
    if report.interrupted {
        let _ = writeln!(out, "Interrupted before all flags were updated");
    }

    for (label, changes) in [("Flagged", &report.added), ("Unflagged", &report.removed)] {
        if changes.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}:", label);
        for change in changes {
            let location = if change.collections.is_empty() {
                "unfiled".to_string()
            } else {
                change.collections.join(", ")
            };
            let _ = writeln!(out, "  - {} ({}) [{}]", change.title, change.document_id, location);
        }
    }
    for failure in &report.failures {
        let _ = writeln!(out, "  ! {} ({}): {}", failure.title, failure.document_id, failure.error);
    }
    let _ = writeln!(out, "{}", RULE);
    out
}

pub fn render_aggregation(result: &AggregationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Collection: {}", result.collection_path);
    let _ = writeln!(out, "Question: {}", result.question);
    let _ = writeln!(
        out,
        "Summaries used: {} of {} documents",
        result.items_with_summaries, result.items_total
    );

    if !result.answer.is_empty() {
        let _ = writeln!(out, "\n{}\n\n{}\n", result.qa_title, result.answer);
    }
    if result.qa_created {
        let action = if result.appended { "Appended to" } else { "Created" };
        let _ = writeln!(out, "{} QA note in '{}'", action, result.target_collection);
    }
    if let Some(ref error) = result.error {
        let _ = writeln!(out, "Error: {}", error);
    }

    if !result.items_skipped.is_empty() {
        let _ = writeln!(out, "\nSkipped documents:");
        for skip in &result.items_skipped {
            let _ = writeln!(out, "  - {}: {}", skip.title, skip.reason);
        }
    }
    let _ = writeln!(out, "{}", RULE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use zotero_llm_tasks::{FailureEntry, SkipEntry, TaskKind};

    fn report() -> BatchReport {
        BatchReport {
            task: TaskKind::LlmSummary,
            total: 4,
            succeeded: 2,
            failed: 1,
            skipped_no_text: 1,
            skipped_already_done: 0,
            failures: vec![FailureEntry {
                document_id: "P3".to_string(),
                title: "Broken".to_string(),
                error: "Inference error: timeout".to_string(),
            }],
            skips: vec![SkipEntry {
                document_id: "P4".to_string(),
                title: "Scanned".to_string(),
                reason: "No full text available".to_string(),
            }],
            outcomes: Vec::new(),
            interrupted: false,
        }
    }

    #[test]
    fn test_batch_summary_lists_reasons() {
        let text = render_batch(&report());
        assert!(text.contains("Task: llm_summary"));
        assert!(text.contains("Succeeded: 2"));
        assert!(text.contains("Skipped: 1 (0 already done, 1 without text)"));
        assert!(text.contains("  - Scanned (P4): No full text available"));
        assert!(text.contains("  - Broken (P3): Inference error: timeout"));
        assert!(!text.contains("Interrupted"));
    }

    #[test]
    fn test_batch_json_has_counts() {
        let json = to_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["task"], "llm_summary");
        assert_eq!(value["failed"], 1);
        assert_eq!(value["failures"][0]["document_id"], "P3");
    }
}
