//! Anthropic Messages API backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use zotero_llm_core::defaults::{ANTHROPIC_MAX_TOKENS, LLM_TIMEOUT_SECS};
use zotero_llm_core::{Error, GenerationBackend, GenerationOptions, Result};

use crate::openai::{error_from_response, send_error, ChatMessage};
use crate::thinking::clean_response;

/// Default Anthropic API endpoint.
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com/v1";

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const PROVIDER: &str = "anthropic";

/// Configuration for the Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
    /// Default sampling parameters. `min_p` is never sent.
    pub sampling: GenerationOptions,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_ANTHROPIC_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_seconds: LLM_TIMEOUT_SECS,
            sampling: GenerationOptions::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Claude backend.
pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = PROVIDER,
            url = %config.base_url,
            model = %config.model,
            "Initializing Anthropic backend"
        );

        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    async fn generate_with_options(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let merged = options.or(&self.config.sampling);
        let timeout = merged.timeout.unwrap_or_else(|| self.timeout());
        let url = self.messages_url();

        let request = MessagesRequest {
            model: merged
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: merged.max_tokens.unwrap_or(ANTHROPIC_MAX_TOKENS),
            temperature: merged.temperature,
            top_p: merged.top_p,
            top_k: merged.top_k,
        };

        debug!(
            subsystem = "inference",
            component = PROVIDER,
            op = "generate",
            model = %request.model,
            prompt_len = prompt.len(),
            "Generating"
        );

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(PROVIDER, &url, timeout, e))?;

        if !response.status().is_success() {
            return Err(error_from_response(PROVIDER, response).await);
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let text = result.content.first().and_then(|b| b.text.as_deref());
        Ok(clean_response(PROVIDER, text))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }
}
