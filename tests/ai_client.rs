use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatterbox_server::error::{AiError, Error};
use chatterbox_server::AiClient;

#[tokio::test]
async fn test_reply_returns_generated_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/test-model"))
        .and(body_json(json!({ "inputs": "hello" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "generated_text": "hi there" }])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client =
        AiClient::new(&mock_server.uri(), "", "test-model").expect("Failed to build client");
    let reply = client.reply("hello").await.expect("Expected a reply");
    assert_eq!(reply, "hi there");
}

#[tokio::test]
async fn test_reply_sends_bearer_token_when_configured() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/test-model"))
        .and(header("authorization", "Bearer hf_secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "generated_text": "ok" }])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = AiClient::new(&mock_server.uri(), "hf_secret", "test-model")
        .expect("Failed to build client");
    client.reply("hello").await.expect("Expected a reply");
}

#[tokio::test]
async fn test_model_loading_maps_to_retryable_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/test-model"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "error": "Model is loading" })),
        )
        .mount(&mock_server)
        .await;

    let client =
        AiClient::new(&mock_server.uri(), "", "test-model").expect("Failed to build client");
    let err = client.reply("hello").await.unwrap_err();
    assert!(matches!(err, Error::Ai(AiError::ModelLoading)));
}

#[tokio::test]
async fn test_provider_throttle_maps_to_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/test-model"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let client =
        AiClient::new(&mock_server.uri(), "", "test-model").expect("Failed to build client");
    let err = client.reply("hello").await.unwrap_err();
    assert!(matches!(err, Error::Ai(AiError::RateLimited)));
}

#[tokio::test]
async fn test_malformed_success_body_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/test-model"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&mock_server)
        .await;

    let client =
        AiClient::new(&mock_server.uri(), "", "test-model").expect("Failed to build client");
    let err = client.reply("hello").await.unwrap_err();
    assert!(matches!(err, Error::Ai(AiError::ResponseError(_))));
}

#[tokio::test]
async fn test_unexpected_status_carries_status_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/test-model"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let client =
        AiClient::new(&mock_server.uri(), "", "test-model").expect("Failed to build client");
    match client.reply("hello").await.unwrap_err() {
        Error::Ai(AiError::RequestFailed(detail)) => {
            assert!(detail.contains("500"));
            assert!(detail.contains("boom"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_invalid_endpoint_rejected_at_construction() {
    let err = AiClient::new("not a url", "", "test-model").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
