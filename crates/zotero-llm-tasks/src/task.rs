//! Built-in per-document tasks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use zotero_llm_core::defaults::{KEY_REFERENCES_TAG, SUMMARY_TAG};
use zotero_llm_core::Error;

/// A per-document analysis task.
///
/// Each task pairs a prompt template key with the title of the note it
/// writes and the tag that marks a document as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    LlmSummary,
    KeyReferences,
}

impl TaskKind {
    pub const ALL: [TaskKind; 2] = [TaskKind::LlmSummary, TaskKind::KeyReferences];

    /// Name used on the command line and in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LlmSummary => "llm_summary",
            Self::KeyReferences => "key_references",
        }
    }

    /// Key of the prompt template in the prompt library.
    pub fn prompt_key(&self) -> &'static str {
        match self {
            Self::LlmSummary => "analyze_item",
            Self::KeyReferences => "key_references",
        }
    }

    /// Title of the note the task writes.
    pub fn note_title(&self) -> &'static str {
        match self {
            Self::LlmSummary => "LLM Summary",
            Self::KeyReferences => "Key References",
        }
    }

    /// Idempotence tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::LlmSummary => SUMMARY_TAG,
            Self::KeyReferences => KEY_REFERENCES_TAG,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "llm_summary" => Ok(Self::LlmSummary),
            "key_references" => Ok(Self::KeyReferences),
            other => Err(Error::UnknownTask(other.to_string())),
        }
    }
}

/// Per-task overrides from the `tasks` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSettings {
    /// Acquire attachment full text and skip documents without any.
    #[serde(default = "default_true")]
    pub include_fulltext: bool,
    /// Write the analysis as a note (and therefore tag the document).
    #[serde(default = "default_true")]
    pub create_note: bool,
    #[serde(default)]
    pub max_prompt_chars: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            include_fulltext: true,
            create_note: true,
            max_prompt_chars: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_descriptors() {
        assert_eq!(TaskKind::LlmSummary.prompt_key(), "analyze_item");
        assert_eq!(TaskKind::LlmSummary.note_title(), "LLM Summary");
        assert_eq!(TaskKind::LlmSummary.tag(), "llm_summary");
        assert_eq!(TaskKind::KeyReferences.prompt_key(), "key_references");
        assert_eq!(TaskKind::KeyReferences.note_title(), "Key References");
        assert_eq!(TaskKind::KeyReferences.tag(), "key_references");
    }

    #[test]
    fn test_parse_task_names() {
        for task in TaskKind::ALL {
            assert_eq!(task.name().parse::<TaskKind>().unwrap(), task);
        }
        assert_eq!(" LLM_Summary ".parse::<TaskKind>().unwrap(), TaskKind::LlmSummary);
    }

    #[test]
    fn test_unknown_task_is_config_error() {
        let err = "summarize_everything".parse::<TaskKind>().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("summarize_everything"));
    }

    #[test]
    fn test_settings_defaults_from_partial_yaml() {
        let settings: TaskSettings = serde_yaml::from_str("max_prompt_chars: 1000").unwrap();
        assert!(settings.include_fulltext);
        assert!(settings.create_note);
        assert_eq!(settings.max_prompt_chars, Some(1000));

        let settings: TaskSettings = serde_yaml::from_str("include_fulltext: false").unwrap();
        assert!(!settings.include_fulltext);
    }
}
