//! OpenAI-compatible inference backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use zotero_llm_core::defaults::{LLM_TIMEOUT_SECS, OPENROUTER_TIMEOUT_SECS};
use zotero_llm_core::{Error, GenerationBackend, GenerationOptions, Result};

use super::error::{to_core_error, OpenAIErrorCode};
use super::types::*;
use crate::thinking::clean_response;

/// Default OpenAI API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default OpenRouter API endpoint.
pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = "gpt-4o-mini";

/// Referer OpenRouter uses for app attribution.
pub const OPENROUTER_REFERER: &str = "https://github.com/zotero-llm-assistant";

/// App name shown on OpenRouter.
pub const OPENROUTER_TITLE: &str = "Zotero LLM Assistant";

/// Configuration for OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Provider label used in logs and errors (`local`, `openai`, `openrouter`).
    pub provider: String,
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for generation.
    pub gen_model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// HTTP-Referer header for OpenRouter.ai rankings (optional).
    pub http_referer: Option<String>,
    /// X-Title header for app name on OpenRouter.ai (optional).
    pub x_title: Option<String>,
    /// Default sampling parameters; per-call options override these.
    pub sampling: GenerationOptions,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            gen_model: DEFAULT_GEN_MODEL.to_string(),
            timeout_seconds: LLM_TIMEOUT_SECS,
            http_referer: None,
            x_title: None,
            sampling: GenerationOptions::default(),
        }
    }
}

impl OpenAIConfig {
    /// Local OpenAI-compatible server on `localhost:{port}`.
    pub fn local(port: u16, model: impl Into<String>) -> Self {
        Self {
            provider: "local".to_string(),
            base_url: format!("http://localhost:{}/v1", port),
            gen_model: model.into(),
            ..Default::default()
        }
    }

    /// OpenAI cloud API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            gen_model: model.into(),
            ..Default::default()
        }
    }

    /// OpenRouter, with attribution headers and a longer timeout.
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: "openrouter".to_string(),
            base_url: DEFAULT_OPENROUTER_URL.to_string(),
            api_key: Some(api_key.into()),
            gen_model: model.into(),
            timeout_seconds: OPENROUTER_TIMEOUT_SECS,
            http_referer: Some(OPENROUTER_REFERER.to_string()),
            x_title: Some(OPENROUTER_TITLE.to_string()),
            ..Default::default()
        }
    }

    /// Full chat-completions URL.
    pub fn chat_completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

/// OpenAI-compatible inference backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = %config.provider,
            url = %config.base_url,
            model = %config.gen_model,
            "Initializing OpenAI-compatible backend"
        );

        Ok(Self { client, config })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        // Add OpenRouter-specific headers if configured
        if let Some(ref referer) = self.config.http_referer {
            req = req.header("HTTP-Referer", referer);
        }

        if let Some(ref title) = self.config.x_title {
            req = req.header("X-Title", title);
        }

        req.header("Content-Type", "application/json")
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate_with_options(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let merged = options.or(&self.config.sampling);
        let model = merged
            .model
            .clone()
            .unwrap_or_else(|| self.config.gen_model.clone());
        let timeout = merged.timeout.unwrap_or_else(|| self.timeout());
        let url = self.config.chat_completions_url();

        debug!(
            subsystem = "inference",
            component = %self.config.provider,
            op = "generate",
            model = %model,
            prompt_len = prompt.len(),
            timeout_secs = timeout.as_secs(),
            "Generating"
        );

        let request = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: merged.max_tokens,
            temperature: merged.temperature,
            top_p: merged.top_p,
            top_k: merged.top_k,
            min_p: merged.min_p,
        };

        let response = self
            .build_request(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(&self.config.provider, &url, timeout, e))?;

        if !response.status().is_success() {
            return Err(error_from_response(&self.config.provider, response).await);
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = clean_response(&self.config.provider, result.first_content());
        debug!(
            subsystem = "inference",
            component = %self.config.provider,
            response_len = content.len(),
            "Generation complete"
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }
}

/// Map a transport failure to an inference error.
pub(crate) fn send_error(provider: &str, url: &str, timeout: Duration, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        warn!(
            subsystem = "inference",
            component = provider,
            timeout_secs = timeout.as_secs(),
            "LLM request timed out"
        );
        Error::Inference(format!(
            "{}: request timed out after {}s",
            provider,
            timeout.as_secs()
        ))
    } else if e.is_connect() {
        warn!(
            subsystem = "inference",
            component = provider,
            url,
            "Connection failed; is the server running?"
        );
        Error::Inference(format!("{}: connection failed to {}", provider, url))
    } else {
        Error::Inference(format!("{}: request failed: {}", provider, e))
    }
}

/// Build an error from a non-success response, reading the provider's
/// error body when it has one.
pub(crate) async fn error_from_response(provider: &str, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let (message, error_type) = match serde_json::from_str::<OpenAIErrorResponse>(&body) {
        Ok(parsed) => (parsed.error.message, parsed.error.error_type),
        Err(_) if body.is_empty() => ("Unknown error".to_string(), String::new()),
        Err(_) => (body, String::new()),
    };

    let code = OpenAIErrorCode::from_response(status.as_u16(), &error_type);
    warn!(
        subsystem = "inference",
        component = provider,
        status = status.as_u16(),
        ?code,
        "LLM request failed"
    );
    to_core_error(code, provider, &format!("{} {}", status, message))
}
