//! Mock generation backend for deterministic testing.
//!
//! Records every call and returns canned responses, with optional failure
//! injection keyed on prompt content.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zotero_llm_inference::mock::MockGenerationBackend;
//! use zotero_llm_core::GenerationBackend;
//!
//! #[tokio::test]
//! async fn test_with_mock_backend() {
//!     let backend = MockGenerationBackend::new()
//!         .with_fixed_response("Test response")
//!         .with_failure_containing("Broken Paper");
//!
//!     assert_eq!(backend.generate("hello").await.unwrap(), "Test response");
//!     assert!(backend.generate("Title: Broken Paper").await.is_err());
//! }
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use zotero_llm_core::defaults::LLM_TIMEOUT_SECS;
use zotero_llm_core::{Error, GenerationBackend, GenerationOptions, Result};

/// Mock generation backend for testing.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    model: String,
    timeout: Duration,
    default_response: String,
    /// First matching substring wins.
    responses_containing: Vec<(String, String)>,
    failures_containing: Vec<String>,
    credit_failures_containing: Vec<String>,
    latency_ms: u64,
}

/// A recorded generation call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub prompt: String,
    pub timeout: Option<Duration>,
    pub timestamp: Instant,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            model: "mock-model".to_string(),
            timeout: Duration::from_secs(LLM_TIMEOUT_SECS),
            default_response: "Mock response".to_string(),
            responses_containing: Vec::new(),
            failures_containing: Vec::new(),
            credit_failures_containing: Vec::new(),
            latency_ms: 0,
        }
    }
}

impl MockGenerationBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the reported model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).model = model.into();
        self
    }

    /// Set the reported base timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        Arc::make_mut(&mut self.config).timeout = timeout;
        self
    }

    /// Set a fixed response for generation requests.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Respond with `output` when the prompt contains `needle`.
    pub fn with_response_containing(
        mut self,
        needle: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .responses_containing
            .push((needle.into(), output.into()));
        self
    }

    /// Fail with an inference error when the prompt contains `needle`.
    pub fn with_failure_containing(mut self, needle: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .failures_containing
            .push(needle.into());
        self
    }

    /// Fail with an insufficient-credits error when the prompt contains `needle`.
    pub fn with_credit_failure_containing(mut self, needle: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .credit_failures_containing
            .push(needle.into());
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.lock_log().clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.lock_log().clear()
    }

    /// Get number of generation calls.
    pub fn generate_call_count(&self) -> usize {
        self.lock_log().len()
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, Vec<MockCall>> {
        self.call_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate_with_options(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        self.lock_log().push(MockCall {
            prompt: prompt.to_string(),
            timeout: options.timeout,
            timestamp: Instant::now(),
        });

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if self
            .config
            .credit_failures_containing
            .iter()
            .any(|n| prompt.contains(n.as_str()))
        {
            return Err(Error::InsufficientCredits("mock".to_string()));
        }

        if self
            .config
            .failures_containing
            .iter()
            .any(|n| prompt.contains(n.as_str()))
        {
            return Err(Error::Inference("Simulated failure".to_string()));
        }

        let response = self
            .config
            .responses_containing
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| self.config.default_response.clone());

        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }
}
