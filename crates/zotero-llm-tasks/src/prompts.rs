//! Prompt library loaded from `prompts.yaml`.
//!
//! ```yaml
//! tasks:
//!   analyze_item:
//!     prompt: |
//!       Summarize the research paper below...
//!   key_references:
//!     prompt: |
//!       List the key references...
//!   qa_session:
//!     system_prompt: You are an AI assistant...
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use zotero_llm_core::{Error, Result};

/// Fallback system prompt for interactive QA sessions.
pub const DEFAULT_QA_SYSTEM_PROMPT: &str =
    "You are an AI assistant helping to answer questions about a research paper.";

/// Key of the QA session entry.
const QA_SESSION_KEY: &str = "qa_session";

#[derive(Debug, Default, Deserialize)]
struct PromptsFile {
    #[serde(default)]
    tasks: HashMap<String, PromptEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptEntry {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
}

/// Task prompt templates keyed by prompt key.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    templates: HashMap<String, String>,
    qa_system_prompt: Option<String>,
}

impl PromptLibrary {
    /// Load prompts from a YAML file. A missing file yields an empty library.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                subsystem = "tasks",
                component = "prompts",
                path = %path.display(),
                "Prompts file not found, using default prompts"
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let library = Self::from_yaml_str(&raw)?;
        info!(
            subsystem = "tasks",
            component = "prompts",
            path = %path.display(),
            templates = library.templates.len(),
            "Loaded prompts"
        );
        Ok(library)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let file: PromptsFile = serde_yaml::from_str(raw)?;
        let mut library = Self::default();
        for (key, entry) in file.tasks {
            if key == QA_SESSION_KEY {
                library.qa_system_prompt = entry.system_prompt.filter(|p| !p.trim().is_empty());
                continue;
            }
            if let Some(prompt) = entry.prompt.filter(|p| !p.trim().is_empty()) {
                library.templates.insert(key, prompt);
            }
        }
        Ok(library)
    }

    pub fn with_template(mut self, key: &str, prompt: &str) -> Self {
        self.templates.insert(key.to_string(), prompt.to_string());
        self
    }

    pub fn with_qa_system_prompt(mut self, prompt: &str) -> Self {
        self.qa_system_prompt = Some(prompt.to_string());
        self
    }

    pub fn template(&self, key: &str) -> Option<&str> {
        self.templates.get(key).map(String::as_str)
    }

    /// Template for `key`, or a configuration error naming it.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.template(key).ok_or_else(|| {
            Error::Config(format!(
                "No prompt found for '{}' in the prompts configuration. Please check your prompts.yaml file.",
                key
            ))
        })
    }

    pub fn qa_system_prompt(&self) -> &str {
        self.qa_system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_QA_SYSTEM_PROMPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PROMPTS: &str = r#"
system_prompt: You are an AI assistant specialized in analyzing research documents.
tasks:
  analyze_item:
    prompt: |
      Summarize this paper.
  key_references:
    prompt: ""
  qa_session:
    system_prompt: Answer strictly from the paper.
"#;

    #[test]
    fn test_parse_templates_and_qa_prompt() {
        let library = PromptLibrary::from_yaml_str(PROMPTS).unwrap();
        assert_eq!(library.template("analyze_item"), Some("Summarize this paper.\n"));
        assert_eq!(library.template("key_references"), None);
        assert_eq!(library.qa_system_prompt(), "Answer strictly from the paper.");
    }

    #[test]
    fn test_require_missing_template_is_config_error() {
        let library = PromptLibrary::from_yaml_str(PROMPTS).unwrap();
        let err = library.require("key_references").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("key_references"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PROMPTS.as_bytes()).unwrap();
        let library = PromptLibrary::load(file.path()).unwrap();
        assert!(library.require("analyze_item").is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let library = PromptLibrary::load(dir.path().join("prompts.yaml")).unwrap();
        assert!(library.template("analyze_item").is_none());
        assert_eq!(library.qa_system_prompt(), DEFAULT_QA_SYSTEM_PROMPT);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(PromptLibrary::from_yaml_str("tasks: [unclosed").is_err());
    }
}
