//! Integration tests for the Anthropic backend against a mock server.

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zotero_llm_core::{Error, GenerationBackend};
use zotero_llm_inference::anthropic::{AnthropicBackend, AnthropicConfig, ANTHROPIC_VERSION};

async fn backend_for(server: &MockServer, min_p: Option<f32>) -> AnthropicBackend {
    let mut config = AnthropicConfig::new("sk-ant-test", "claude-3-5-haiku-latest");
    config.base_url = server.uri();
    config.sampling.min_p = min_p;
    config.sampling.top_k = Some(20);
    AnthropicBackend::new(config).unwrap()
}

#[tokio::test]
async fn test_messages_request_shape() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", ANTHROPIC_VERSION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "A concise summary."}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server, Some(0.1)).await;
    assert_eq!(
        backend.generate("Summarize").await.unwrap(),
        "A concise summary."
    );

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["top_k"], 20);
    assert!(body.get("min_p").is_none());
    assert!(body.get("max_tokens").is_some());
}

#[tokio::test]
async fn test_empty_content_becomes_marker() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server, None).await;
    assert_eq!(backend.generate("x").await.unwrap(), "No response generated");
}

#[tokio::test]
async fn test_error_body_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server, None).await;
    let err = backend.generate("x").await.unwrap_err();
    assert!(matches!(err, Error::Inference(_)));
    assert!(err.to_string().contains("invalid x-api-key"));
}
