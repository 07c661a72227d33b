//! Upstream failures surface as classified errors

mod harness;

use std::time::Duration;

use harness::config::{bridge, bridge_config};
use harness::mock_provider::{MockProvider, Reply};
use serde_json::json;
use switchboard_config::ProviderType;
use switchboard_llm::{Bridge, BridgeError, ErrorKind, Prompt};

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/chat/completions",
        Reply::error(
            429,
            &json!({"error": {"message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded"}}),
        )
        .with_header("retry-after", "7"),
    );

    let bridge = bridge(&mock, ProviderType::Openai, "gpt-4o").await;
    let err = bridge.invoke(&Prompt::user("Hi"), None).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.status(), Some(429));
    let BridgeError::RateLimit { retry_after, .. } = err else {
        panic!("expected rate limit");
    };
    assert_eq!(retry_after, Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn anthropic_authentication_error() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/messages",
        Reply::error(
            401,
            &json!({"type": "error", "error": {"type": "authentication_error", "message": "invalid x-api-key"}}),
        ),
    );

    let bridge = bridge(&mock, ProviderType::Anthropic, "claude-sonnet-4-5").await;
    let err = bridge.invoke(&Prompt::user("Hi"), None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("invalid x-api-key"));
}

#[tokio::test]
async fn context_overflow_is_invalid_request() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/chat/completions",
        Reply::error(
            400,
            &json!({"error": {"message": "maximum context length exceeded", "code": "context_length_exceeded"}}),
        ),
    );

    let bridge = bridge(&mock, ProviderType::Openai, "gpt-4o").await;
    let err = bridge.invoke(&Prompt::user("Hi"), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn gemini_status_name_classifies() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1beta/models/gemini-2.0-flash:generateContent",
        Reply::error(
            429,
            &json!({"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}),
        ),
    );

    let bridge = bridge(&mock, ProviderType::Google, "gemini-2.0-flash").await;
    let err = bridge.invoke(&Prompt::user("Hi"), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
}

#[tokio::test]
async fn server_error_before_stream_starts() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/messages",
        Reply::error(529, &json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}})),
    );

    let bridge = bridge(&mock, ProviderType::Anthropic, "claude-sonnet-4-5").await;
    let err = bridge.invoke_stream(&Prompt::user("Hi"), None).await.err().unwrap();

    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert_eq!(err.status(), Some(529));
}

#[tokio::test]
async fn unknown_model_on_ollama() {
    let mock = MockProvider::start().await.unwrap();
    mock.on("/api/chat", Reply::error(404, &json!({"error": "model \"nope\" not found"})));

    let bridge = bridge(&mock, ProviderType::Ollama, "nope").await;
    let err = bridge.invoke(&Prompt::user("Hi"), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelNotSupported);
}

#[tokio::test]
async fn undecodable_body_is_parsing_error() {
    let mock = MockProvider::start().await.unwrap();
    mock.on("/v1/chat/completions", Reply::json(&json!("not a completion")));

    let bridge = bridge(&mock, ProviderType::Openai, "gpt-4o").await;
    let err = bridge.invoke(&Prompt::user("Hi"), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResponseParsing);
}

#[tokio::test]
async fn slow_provider_times_out() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/chat/completions",
        Reply::json(&json!({"choices": []})).delayed(Duration::from_secs(5)),
    );

    let mut config = bridge_config(&mock, ProviderType::Openai, "gpt-4o");
    config.timeout = Some("100ms".to_owned());
    let bridge = Bridge::new("slow", &config).await.unwrap();

    let err = bridge.invoke(&Prompt::user("Hi"), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);

    let err = bridge.invoke_stream(&Prompt::user("Hi"), None).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn unreachable_provider_is_not_a_timeout() {
    let mock = MockProvider::start().await.unwrap();
    let config = bridge_config(&mock, ProviderType::Openai, "gpt-4o");
    drop(mock);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let bridge = Bridge::new("gone", &config).await.unwrap();
    let err = bridge.invoke(&Prompt::user("Hi"), None).await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ServiceUnavailable | ErrorKind::Network));
    assert!(err.is_retryable());
}
