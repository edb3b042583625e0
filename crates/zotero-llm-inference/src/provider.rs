//! Backend construction from configuration.

use std::sync::Arc;

use tracing::info;

use zotero_llm_core::{Error, GenerationBackend, Result};

use crate::anthropic::{AnthropicBackend, AnthropicConfig};
use crate::config::{LlmConfig, Provider};
use crate::openai::{OpenAIBackend, OpenAIConfig};

/// Validate `config` and build the backend it selects.
pub fn create_backend(config: &LlmConfig) -> Result<Arc<dyn GenerationBackend>> {
    let provider = config.validate()?;
    let api_key = config.resolved_api_key();
    let timeout_seconds = config.timeout(provider).as_secs();

    info!(
        subsystem = "inference",
        component = %provider,
        model = %config.model,
        timeout_secs = timeout_seconds,
        "Using LLM provider"
    );

    let backend: Arc<dyn GenerationBackend> = match provider {
        Provider::Anthropic => {
            let key = api_key.ok_or_else(|| missing_key(provider))?;
            let mut cfg = AnthropicConfig::new(key, config.model.clone());
            if let Some(ref url) = config.base_url {
                cfg.base_url = url.clone();
            }
            cfg.timeout_seconds = timeout_seconds;
            cfg.sampling = config.sampling();
            Arc::new(AnthropicBackend::new(cfg)?)
        }
        Provider::OpenRouter => {
            let key = api_key.ok_or_else(|| missing_key(provider))?;
            let mut cfg = OpenAIConfig::openrouter(key, config.model.clone());
            apply_overrides(&mut cfg, config, timeout_seconds);
            Arc::new(OpenAIBackend::new(cfg)?)
        }
        Provider::OpenAI => {
            let key = api_key.ok_or_else(|| missing_key(provider))?;
            let mut cfg = OpenAIConfig::openai(key, config.model.clone());
            apply_overrides(&mut cfg, config, timeout_seconds);
            Arc::new(OpenAIBackend::new(cfg)?)
        }
        Provider::Local => {
            let mut cfg = OpenAIConfig::local(config.port.unwrap_or_default(), config.model.clone());
            cfg.api_key = api_key;
            apply_overrides(&mut cfg, config, timeout_seconds);
            Arc::new(OpenAIBackend::new(cfg)?)
        }
    };

    Ok(backend)
}

fn apply_overrides(cfg: &mut OpenAIConfig, config: &LlmConfig, timeout_seconds: u64) {
    if let Some(ref url) = config.base_url {
        cfg.base_url = url.clone();
    }
    cfg.timeout_seconds = timeout_seconds;
    cfg.sampling = config.sampling();
}

fn missing_key(provider: Provider) -> Error {
    Error::Config(format!("API key required for {}", provider))
}
