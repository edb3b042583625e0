//! LLM provider configuration.
//!
//! The `llm` section of the YAML configuration selects a provider and its
//! sampling defaults. Validation happens once, before any document is
//! touched; every failure here is a configuration error.
//!
//! # Example
//!
//! ```rust
//! use zotero_llm_inference::config::{LlmConfig, Provider};
//!
//! let config: LlmConfig = serde_yaml::from_str("provider: local\nmodel: qwen3-8b\nport: 1234").unwrap();
//! assert_eq!(config.validate().unwrap(), Provider::Local);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use zotero_llm_core::defaults::{LLM_TIMEOUT_SECS, OPENROUTER_TIMEOUT_SECS};
use zotero_llm_core::{Error, GenerationOptions, Result};

/// Environment variable consulted when `api_key` is not configured.
pub const API_KEY_ENV: &str = "LLM_API_KEY";

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Local,
    OpenAI,
    Anthropic,
    OpenRouter,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Local,
        Provider::OpenAI,
        Provider::Anthropic,
        Provider::OpenRouter,
    ];

    /// Whether requests need an API key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Local)
    }

    /// Base per-call timeout.
    pub fn default_timeout_secs(&self) -> u64 {
        match self {
            Self::OpenRouter => OPENROUTER_TIMEOUT_SECS,
            _ => LLM_TIMEOUT_SECS,
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "openrouter" => Ok(Self::OpenRouter),
            _ => Err(Error::Config(format!(
                "Unknown provider: {}. Valid options: local, openai, anthropic, openrouter",
                s
            ))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::OpenAI => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenRouter => write!(f, "openrouter"),
        }
    }
}

fn default_provider() -> String {
    Provider::default().to_string()
}

/// The `llm` configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// One of `local`, `openai`, `anthropic`, `openrouter`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    /// Port of the local server; required for `local`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Overrides the provider's endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f32>,
    /// Base per-call timeout; defaults per provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: String::new(),
            port: None,
            api_key: None,
            base_url: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            top_k: None,
            min_p: None,
            timeout_secs: None,
        }
    }
}

impl LlmConfig {
    /// Validate the configuration, returning the parsed provider.
    pub fn validate(&self) -> Result<Provider> {
        self.validate_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn validate_with_env(&self, env_key: Option<String>) -> Result<Provider> {
        let provider: Provider = self.provider.parse()?;

        if self.model.trim().is_empty() {
            return Err(Error::Config(format!(
                "Model is required for {}. Set llm.model in config.yaml",
                provider
            )));
        }

        if provider == Provider::Local && self.port.is_none() && self.base_url.is_none() {
            return Err(Error::Config(
                "Port is required for local provider. Set llm.port in config.yaml".to_string(),
            ));
        }

        if provider.requires_api_key() && self.api_key_with_env(env_key).is_none() {
            return Err(Error::Config(format!(
                "API key required for {}. Set llm.api_key in config.yaml or the {} environment variable",
                provider, API_KEY_ENV
            )));
        }

        Ok(provider)
    }

    /// Configured API key, falling back to `LLM_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_with_env(&self, env_key: Option<String>) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or(env_key.filter(|k| !k.trim().is_empty()))
    }

    /// Base per-call timeout for `provider`.
    pub fn timeout(&self, provider: Provider) -> Duration {
        Duration::from_secs(
            self.timeout_secs
                .unwrap_or_else(|| provider.default_timeout_secs()),
        )
    }

    /// Sampling defaults applied to every call.
    pub fn sampling(&self) -> GenerationOptions {
        GenerationOptions {
            model: None,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            min_p: self.min_p,
            timeout: None,
        }
    }
}
