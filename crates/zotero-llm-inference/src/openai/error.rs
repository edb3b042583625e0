//! Provider error classification.
//!
//! Shared by the OpenAI-compatible and Anthropic backends, which report
//! failures with the same HTTP status conventions.

use zotero_llm_core::Error;

/// Provider error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    /// Invalid authentication credentials.
    AuthenticationError,
    /// Account has no remaining balance.
    InsufficientCredits,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Request too large.
    ContextLengthExceeded,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) | (403, _) => Self::AuthenticationError,
            (402, _) => Self::InsufficientCredits,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Convert a provider error into the crate error type.
pub fn to_core_error(code: OpenAIErrorCode, provider: &str, message: &str) -> Error {
    match code {
        OpenAIErrorCode::InsufficientCredits => Error::InsufficientCredits(provider.to_string()),
        OpenAIErrorCode::AuthenticationError => {
            Error::Inference(format!("{}: authentication failed: {}", provider, message))
        }
        OpenAIErrorCode::RateLimitExceeded => {
            Error::Inference(format!("{}: rate limit exceeded: {}", provider, message))
        }
        OpenAIErrorCode::ModelNotFound => {
            Error::Inference(format!("{}: model not found: {}", provider, message))
        }
        OpenAIErrorCode::ContextLengthExceeded => {
            Error::Inference(format!("{}: context too long: {}", provider, message))
        }
        OpenAIErrorCode::ServerError => {
            Error::Inference(format!("{}: server error: {}", provider, message))
        }
        OpenAIErrorCode::Unknown => Error::Inference(format!("{}: {}", provider, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_401() {
        let code = OpenAIErrorCode::from_response(401, "invalid_api_key");
        assert_eq!(code, OpenAIErrorCode::AuthenticationError);
    }

    #[test]
    fn test_error_code_from_402() {
        let code = OpenAIErrorCode::from_response(402, "");
        assert_eq!(code, OpenAIErrorCode::InsufficientCredits);
    }

    #[test]
    fn test_error_code_from_429() {
        let code = OpenAIErrorCode::from_response(429, "rate_limit_exceeded");
        assert_eq!(code, OpenAIErrorCode::RateLimitExceeded);
    }

    #[test]
    fn test_error_code_from_404() {
        let code = OpenAIErrorCode::from_response(404, "model_not_found");
        assert_eq!(code, OpenAIErrorCode::ModelNotFound);
    }

    #[test]
    fn test_error_code_context_length() {
        let code = OpenAIErrorCode::from_response(400, "context_length_exceeded");
        assert_eq!(code, OpenAIErrorCode::ContextLengthExceeded);
    }

    #[test]
    fn test_error_code_from_502() {
        let code = OpenAIErrorCode::from_response(502, "bad_gateway");
        assert_eq!(code, OpenAIErrorCode::ServerError);
    }

    #[test]
    fn test_error_code_from_unknown() {
        let code = OpenAIErrorCode::from_response(418, "im_a_teapot");
        assert_eq!(code, OpenAIErrorCode::Unknown);
    }

    #[test]
    fn test_insufficient_credits_maps_to_dedicated_variant() {
        let err = to_core_error(OpenAIErrorCode::InsufficientCredits, "openrouter", "no funds");
        assert!(matches!(err, Error::InsufficientCredits(ref p) if p == "openrouter"));
        assert!(err.to_string().contains("check your account balance"));
    }

    #[test]
    fn test_to_core_error_auth() {
        let err = to_core_error(OpenAIErrorCode::AuthenticationError, "openai", "Invalid key");
        assert!(err.to_string().contains("authentication failed"));
        assert!(!err.is_config());
    }
}
