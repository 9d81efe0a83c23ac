//! Completion client wire tests

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::services::completion::{CompletionConfig, HttpCompletionClient};
use crate::traits::CompletionClient;
use crate::types::{CompletionFailure, CompletionRequest};

fn request() -> CompletionRequest {
    CompletionRequest {
        operation_id: "getUser".to_string(),
        prompt: "generate scenarios".to_string(),
        model: "gpt-4o-mini".to_string(),
        temperature: 0.7,
        max_tokens: 2048,
        desired_count: 3,
    }
}

fn client_for(server: &MockServer) -> HttpCompletionClient {
    let config = CompletionConfig::new("test-key")
        .with_base_url(server.uri());
    HttpCompletionClient::new(config).unwrap()
}

#[tokio::test]
async fn test_content_is_extracted_from_chat_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_string_contains("generate scenarios"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "[{\"input\": {}}]"}}],
            "usage": {"total_tokens": 123}
        })))
        .mount(&server)
        .await;

    let reply = client_for(&server).complete(&request()).await.unwrap();
    assert_eq!(reply.content, "[{\"input\": {}}]");
    assert_eq!(reply.tokens_used, 123);
    assert_eq!(reply.model, "gpt-4o-mini");
}

#[tokio::test]
async fn test_rate_limit_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&request()).await.unwrap_err();
    assert_eq!(err, CompletionFailure::RateLimited);
}

#[tokio::test]
async fn test_auth_failure_maps_to_authentication_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&request()).await.unwrap_err();
    assert_eq!(err, CompletionFailure::AuthenticationFailed);
}

#[tokio::test]
async fn test_server_error_maps_to_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&request()).await.unwrap_err();
    assert!(matches!(err, CompletionFailure::ServerError(_)));
}

#[tokio::test]
async fn test_reply_without_content_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client_for(&server).complete(&request()).await.unwrap_err();
    assert!(matches!(err, CompletionFailure::InvalidReply(_)));
}

#[tokio::test]
async fn test_dead_endpoint_is_unreachable() {
    // nothing listens on port 9 (discard)
    let config = CompletionConfig {
        api_key: "test-key".to_string(),
        base_url: "http://127.0.0.1:9".to_string(),
        timeout: Duration::from_secs(2),
    };
    let client = HttpCompletionClient::new(config).unwrap();

    let err = client.complete(&request()).await.unwrap_err();
    assert!(matches!(err, CompletionFailure::Unreachable(_)));
}
