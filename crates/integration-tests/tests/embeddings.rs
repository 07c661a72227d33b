//! Embedding bridges against mock endpoints

mod harness;

use harness::config::embedding_config;
use harness::mock_provider::{MockProvider, Reply};
use serde_json::json;
use switchboard_config::EmbeddingProviderType;
use switchboard_embeddings::{EmbeddingBridge, EmbeddingRequest};
use switchboard_llm::{ErrorKind, Usage};

#[tokio::test]
async fn openai_compatible_vectors_in_input_order() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/embeddings",
        Reply::json(&json!({
            "object": "list",
            "data": [
                {"object": "embedding", "embedding": [0.5, 0.5], "index": 1},
                {"object": "embedding", "embedding": [0.25, 0.75], "index": 0}
            ],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 6, "total_tokens": 6}
        })),
    );

    let mut config = embedding_config(&mock, EmbeddingProviderType::OpenaiCompatible, "text-embedding-3-small");
    config.dimensions = Some(2);
    let bridge = EmbeddingBridge::new("vectors", &config).unwrap();

    let response = bridge.embed(&EmbeddingRequest::new(["first", "second"])).await.unwrap();
    assert_eq!(response.embeddings, vec![vec![0.25, 0.75], vec![0.5, 0.5]]);
    assert_eq!(response.usage, Some(Usage::new(6, 0)));

    let request = mock.single_request();
    assert_eq!(request.headers["authorization"], "Bearer test-key");
    assert_eq!(
        request.body,
        json!({
            "input": ["first", "second"],
            "model": "text-embedding-3-small",
            "encoding_format": "float",
            "dimensions": 2
        })
    );
}

#[tokio::test]
async fn short_reply_is_a_parsing_error() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/embeddings",
        Reply::json(&json!({"data": [{"embedding": [1.0], "index": 0}]})),
    );

    let config = embedding_config(&mock, EmbeddingProviderType::Openai, "text-embedding-3-small");
    let bridge = EmbeddingBridge::new("vectors", &config).unwrap();

    let err = bridge.embed(&EmbeddingRequest::new(["a", "b"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResponseParsing);
}

#[tokio::test]
async fn ollama_embed() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/api/embed",
        Reply::json(&json!({
            "model": "nomic-embed-text",
            "embeddings": [[0.1, 0.2, 0.3]],
            "prompt_eval_count": 3
        })),
    );

    let config = embedding_config(&mock, EmbeddingProviderType::Ollama, "nomic-embed-text");
    let bridge = EmbeddingBridge::new("local", &config).unwrap();

    let response = bridge.embed(&EmbeddingRequest::new(["hello"])).await.unwrap();
    assert_eq!(response.embeddings.len(), 1);
    assert_eq!(response.embeddings[0].len(), 3);
    assert_eq!(response.usage, Some(Usage::new(3, 0)));
    assert_eq!(response.model, "nomic-embed-text");

    let body = mock.single_request().body;
    assert_eq!(body, json!({"model": "nomic-embed-text", "input": ["hello"]}));
}

#[tokio::test]
async fn embedding_errors_share_the_taxonomy() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/embeddings",
        Reply::error(401, &json!({"error": {"message": "Incorrect API key", "code": "invalid_api_key"}})),
    );

    let config = embedding_config(&mock, EmbeddingProviderType::Openai, "text-embedding-3-small");
    let bridge = EmbeddingBridge::new("vectors", &config).unwrap();

    let err = bridge.embed(&EmbeddingRequest::new(["a"])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}
