//! Integration tests for the OpenAI-compatible backend.
//!
//! These tests verify request shape, OpenRouter attribution headers, and
//! error mapping against a mock HTTP server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use zotero_llm_core::{Error, GenerationBackend, GenerationOptions};
use zotero_llm_inference::openai::{
    OpenAIBackend, OpenAIConfig, OPENROUTER_REFERER, OPENROUTER_TITLE,
};

fn chat_response(content: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn test_generation_with_openrouter_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-or-test"))
        .and(header("HTTP-Referer", OPENROUTER_REFERER))
        .and(header("X-Title", OPENROUTER_TITLE))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(json!("Hello!"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = OpenAIConfig::openrouter("sk-or-test", "meta-llama/llama-3-70b");
    config.base_url = mock_server.uri();
    let backend = OpenAIBackend::new(config).expect("Failed to create backend");

    let result = backend.generate("Hello").await;
    assert_eq!(result.unwrap(), "Hello!");
}

#[tokio::test]
async fn test_local_backend_sends_no_auth_and_no_unset_sampling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "qwen3-8b",
            "messages": [{"role": "user", "content": "Summarize"}],
            "temperature": 0.2
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(json!("Done"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = OpenAIConfig::local(1, "qwen3-8b");
    config.base_url = format!("{}/v1", mock_server.uri());
    config.sampling.temperature = Some(0.2);
    let backend = OpenAIBackend::new(config).unwrap();

    assert_eq!(backend.generate("Summarize").await.unwrap(), "Done");

    let requests: Vec<Request> = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("Authorization").is_none());
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("max_tokens").is_none());
    assert!(body.get("top_k").is_none());
    assert!(body.get("min_p").is_none());
}

#[tokio::test]
async fn test_per_call_options_override_defaults() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 64, "min_p": 0.05})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(json!("ok"))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = OpenAIConfig::openai("sk-test", "gpt-4o-mini");
    config.base_url = mock_server.uri();
    config.sampling.max_tokens = Some(1000);
    config.sampling.min_p = Some(0.05);
    let backend = OpenAIBackend::new(config).unwrap();

    let options = GenerationOptions {
        max_tokens: Some(64),
        ..Default::default()
    };
    assert_eq!(
        backend.generate_with_options("x", &options).await.unwrap(),
        "ok"
    );
}

#[tokio::test]
async fn test_thinking_patterns_removed_from_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(json!(
            "<think>The user wants a summary.</think>\n\nThe paper proposes X."
        ))))
        .mount(&mock_server)
        .await;

    let mut config = OpenAIConfig::openai("sk-test", "o1");
    config.base_url = mock_server.uri();
    let backend = OpenAIBackend::new(config).unwrap();

    assert_eq!(backend.generate("x").await.unwrap(), "The paper proposes X.");
}

#[tokio::test]
async fn test_empty_content_becomes_marker() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(json!(null))))
        .mount(&mock_server)
        .await;

    let mut config = OpenAIConfig::openai("sk-test", "gpt-4o-mini");
    config.base_url = mock_server.uri();
    let backend = OpenAIBackend::new(config).unwrap();

    assert_eq!(backend.generate("x").await.unwrap(), "No response generated");
}

#[tokio::test]
async fn test_openrouter_402_is_insufficient_credits() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {"message": "Insufficient credits", "code": 402}
        })))
        .mount(&mock_server)
        .await;

    let mut config = OpenAIConfig::openrouter("sk-or-test", "some/model");
    config.base_url = mock_server.uri();
    let backend = OpenAIBackend::new(config).unwrap();

    let err = backend.generate("x").await.unwrap_err();
    assert!(matches!(err, Error::InsufficientCredits(ref p) if p == "openrouter"));
}

#[tokio::test]
async fn test_server_error_is_inference_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let mut config = OpenAIConfig::openai("sk-test", "gpt-4o-mini");
    config.base_url = mock_server.uri();
    let backend = OpenAIBackend::new(config).unwrap();

    let err = backend.generate("x").await.unwrap_err();
    assert!(matches!(err, Error::Inference(_)));
    assert!(err.to_string().contains("boom"));
}

#[tokio::test]
async fn test_per_call_timeout_is_enforced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_response(json!("late")))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let mut config = OpenAIConfig::openai("sk-test", "gpt-4o-mini");
    config.base_url = mock_server.uri();
    let backend = OpenAIBackend::new(config).unwrap();

    let options = GenerationOptions::default().with_timeout(Duration::from_millis(50));
    let err = backend.generate_with_options("x", &options).await.unwrap_err();
    assert!(err.to_string().contains("timed out"));
}
