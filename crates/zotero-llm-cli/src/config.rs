//! Application configuration.
//!
//! Loaded from a YAML file (default `config.yaml`). `${VAR}` placeholders
//! are replaced from the environment before parsing; unknown variables are
//! left in place so validation can report them.

use std::env;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::debug;

use zotero_llm_core::defaults::MISSING_PDF_TAG;
use zotero_llm_core::{Error, Result};
use zotero_llm_inference::LlmConfig;
use zotero_llm_store::ZoteroConfig;
use zotero_llm_tasks::{AggregationSettings, TaskKind, TaskSettings};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_PROMPTS_FILE: &str = "prompts.yaml";

static ENV_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid placeholder pattern"));

/// Replace `${VAR_NAME}` with the variable's value, when set.
pub fn substitute_env_vars(content: &str) -> String {
    ENV_PLACEHOLDER
        .replace_all(content, |caps: &Captures| {
            let name = &caps[1];
            env::var(name).unwrap_or_else(|_| format!("${{{}}}", name))
        })
        .to_string()
}

/// The `tasks` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TasksConfig {
    #[serde(default)]
    pub analyze_item: TaskSettings,
    #[serde(default)]
    pub key_references: TaskSettings,
    #[serde(default)]
    pub summary_qa: AggregationSettings,
}

impl TasksConfig {
    pub fn settings_for(&self, task: TaskKind) -> TaskSettings {
        match task {
            TaskKind::LlmSummary => self.analyze_item.clone(),
            TaskKind::KeyReferences => self.key_references.clone(),
        }
    }
}

/// The `reconcile` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_flag_tag")]
    pub flag_tag: String,
}

fn default_flag_tag() -> String {
    MISSING_PDF_TAG.to_string()
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            flag_tag: default_flag_tag(),
        }
    }
}

fn default_prompts_file() -> PathBuf {
    PathBuf::from(DEFAULT_PROMPTS_FILE)
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub zotero: ZoteroConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Relative paths resolve against the configuration file's directory.
    #[serde(default = "default_prompts_file")]
    pub prompts_file: PathBuf,
}

impl AppConfig {
    /// Read, substitute, and parse a configuration file. Does not validate.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Cannot read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut config = Self::from_yaml_str(&raw)?;

        if config.prompts_file.is_relative() {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                config.prompts_file = dir.join(&config.prompts_file);
            }
        }
        debug!(
            config_file = %path.display(),
            prompts_file = %config.prompts_file.display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let content = substitute_env_vars(raw);
        serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// Store credentials and LLM provider settings.
    pub fn validate(&self) -> Result<()> {
        self.zotero.validate()?;
        self.llm.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"
zotero:
  library_id: "123456"
  library_type: group
  api_key: "zot-key"
llm:
  provider: local
  model: qwen3-8b
  port: 1234
  temperature: 0.2
tasks:
  analyze_item:
    max_prompt_chars: 200000
  key_references:
    include_fulltext: false
    create_note: false
  summary_qa:
    max_prompt_chars: 500000
reconcile:
  flag_tag: no_pdf
prompts_file: my_prompts.yaml
"#;

    #[test]
    fn test_full_config_parses() {
        let config = AppConfig::from_yaml_str(FULL_CONFIG).unwrap();
        assert_eq!(config.zotero.library_id, "123456");
        assert_eq!(config.llm.port, Some(1234));
        assert_eq!(config.tasks.analyze_item.max_prompt_chars, Some(200_000));
        assert!(config.tasks.analyze_item.include_fulltext);
        assert!(!config.tasks.key_references.create_note);
        assert_eq!(config.tasks.summary_qa.max_prompt_chars, Some(500_000));
        assert_eq!(config.reconcile.flag_tag, "no_pdf");
        assert!(config.validate().is_ok());

        let settings = config.tasks.settings_for(TaskKind::KeyReferences);
        assert!(!settings.include_fulltext);
    }

    #[test]
    fn test_defaults_for_missing_sections() {
        let config = AppConfig::from_yaml_str("zotero:\n  library_id: '1'\n  api_key: k\n").unwrap();
        assert_eq!(config.reconcile.flag_tag, MISSING_PDF_TAG);
        assert_eq!(config.prompts_file, PathBuf::from(DEFAULT_PROMPTS_FILE));
        assert_eq!(config.tasks.settings_for(TaskKind::LlmSummary), TaskSettings::default());
        // No model configured
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_missing_credentials_fail_validation() {
        let config = AppConfig::from_yaml_str("llm:\n  provider: local\n  model: m\n  port: 1\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("Zotero credentials"));
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("ZOTERO_LLM_TEST_API_KEY", "from-env");
        let result = substitute_env_vars("api_key: ${ZOTERO_LLM_TEST_API_KEY}");
        env::remove_var("ZOTERO_LLM_TEST_API_KEY");
        assert_eq!(result, "api_key: from-env");

        let untouched = substitute_env_vars("api_key: ${ZOTERO_LLM_UNSET_VAR_98765}");
        assert_eq!(untouched, "api_key: ${ZOTERO_LLM_UNSET_VAR_98765}");
    }

    #[test]
    fn test_load_resolves_prompts_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, FULL_CONFIG).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.prompts_file, dir.path().join("my_prompts.yaml"));
    }

    #[test]
    fn test_load_reports_unreadable_and_invalid_files() {
        let err = AppConfig::load(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(err.is_config());

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"zotero: [not, a, map]").unwrap();
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }
}
