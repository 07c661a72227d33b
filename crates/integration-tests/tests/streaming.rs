//! Streaming invocation: reassembly, early drop and mid-stream failures

mod harness;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use harness::collect;
use harness::config::bridge;
use harness::mock_provider::{MockProvider, Reply};
use serde_json::json;
use switchboard_config::ProviderType;
use switchboard_llm::{ErrorKind, InvokeOptions, Prompt, ToolDeclaration, Usage};

fn openai_chunk(delta: &serde_json::Value, finish_reason: Option<&str>) -> serde_json::Value {
    json!({
        "id": "chatcmpl-stream",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}]
    })
}

#[tokio::test]
async fn openai_text_and_usage() {
    let mock = MockProvider::start().await.unwrap();
    let events = [
        openai_chunk(&json!({"role": "assistant", "content": ""}), None),
        openai_chunk(&json!({"content": "Hello "}), None),
        openai_chunk(&json!({"content": "world"}), None),
        openai_chunk(&json!({}), Some("stop")),
        json!({"choices": [], "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}}),
    ];
    mock.on("/v1/chat/completions", Reply::sse_done(&events));

    let bridge = bridge(&mock, ProviderType::Openai, "gpt-4o").await;
    let stream = bridge.invoke_stream(&Prompt::user("Hi"), None).await.unwrap();
    let collected = collect(stream).await;

    assert!(collected.error.is_none(), "{:?}", collected.error);
    assert_eq!(collected.text, "Hello world");
    assert_eq!(collected.usage, Some(Usage::new(10, 2)));

    let body = mock.single_request().body;
    assert_eq!(body["stream"], true);
}

#[tokio::test]
async fn openai_tool_call_fragments_are_joined() {
    let mock = MockProvider::start().await.unwrap();
    let events = [
        openai_chunk(
            &json!({"tool_calls": [{
                "index": 0,
                "id": "call_1",
                "type": "function",
                "function": {"name": "get_weather", "arguments": ""}
            }]}),
            None,
        ),
        openai_chunk(
            &json!({"tool_calls": [{"index": 0, "function": {"arguments": "{\"location\":"}}]}),
            None,
        ),
        openai_chunk(
            &json!({"tool_calls": [{"index": 0, "function": {"arguments": "\"Oslo\"}"}}]}),
            None,
        ),
        openai_chunk(&json!({}), Some("tool_calls")),
    ];
    mock.on("/v1/chat/completions", Reply::sse_done(&events));

    let bridge = bridge(&mock, ProviderType::Openai, "gpt-4o").await;
    let options = InvokeOptions {
        tools: vec![ToolDeclaration::new("get_weather", "", json!({"type": "object"}))],
        ..InvokeOptions::default()
    };
    let stream = bridge
        .invoke_stream(&Prompt::user("Weather?"), Some(&options))
        .await
        .unwrap();
    let collected = collect(stream).await;

    assert!(collected.error.is_none());
    assert_eq!(collected.tool_calls.len(), 1);
    assert_eq!(collected.tool_calls[0].id, "call_1");
    assert_eq!(collected.tool_calls[0].arguments["location"], "Oslo");
}

#[tokio::test]
async fn anthropic_events_with_reasoning_and_tool_use() {
    let mock = MockProvider::start().await.unwrap();
    let events = [
        json!({"type": "message_start", "message": {"id": "msg_1", "usage": {"input_tokens": 20, "output_tokens": 1}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "User wants weather."}}),
        json!({"type": "content_block_stop", "index": 0}),
        json!({"type": "content_block_start", "index": 1, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "content_block_delta", "index": 1, "delta": {"type": "text_delta", "text": "Checking."}}),
        json!({"type": "content_block_stop", "index": 1}),
        json!({"type": "content_block_start", "index": 2, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {}}}),
        json!({"type": "content_block_delta", "index": 2, "delta": {"type": "input_json_delta", "partial_json": "{\"location\""}}),
        json!({"type": "content_block_delta", "index": 2, "delta": {"type": "input_json_delta", "partial_json": ":\"Oslo\"}"}}),
        json!({"type": "content_block_stop", "index": 2}),
        json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 15}}),
        json!({"type": "message_stop"}),
    ];
    mock.on("/v1/messages", Reply::named_sse(&events));

    let bridge = bridge(&mock, ProviderType::Anthropic, "claude-sonnet-4-5").await;
    let stream = bridge.invoke_stream(&Prompt::user("Weather?"), None).await.unwrap();
    let collected = collect(stream).await;

    assert!(collected.error.is_none(), "{:?}", collected.error);
    assert_eq!(collected.text, "Checking.\n\nReasoning:\nUser wants weather.");
    assert_eq!(collected.tool_calls.len(), 1);
    assert_eq!(collected.tool_calls[0].name, "get_weather");
    assert_eq!(collected.tool_calls[0].arguments["location"], "Oslo");
    assert_eq!(collected.usage, Some(Usage::new(20, 15)));

    assert_eq!(mock.single_request().body["stream"], true);
}

#[tokio::test]
async fn anthropic_error_event_ends_stream_after_text() {
    let mock = MockProvider::start().await.unwrap();
    let events = [
        json!({"type": "message_start", "message": {"usage": {"input_tokens": 5}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": "Partial"}}),
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
    ];
    mock.on("/v1/messages", Reply::named_sse(&events));

    let bridge = bridge(&mock, ProviderType::Anthropic, "claude-sonnet-4-5").await;
    let stream = bridge.invoke_stream(&Prompt::user("Hi"), None).await.unwrap();
    let collected = collect(stream).await;

    assert_eq!(collected.text, "Partial");
    let err = collected.error.unwrap();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn gemini_sse_emits_last_usage_once() {
    let mock = MockProvider::start().await.unwrap();
    let events = [
        json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Bon"}]}}],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 1}
        }),
        json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "jour"}]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2}
        }),
    ];
    mock.on("/v1beta/models/gemini-2.0-flash:streamGenerateContent", Reply::sse(&events));

    let bridge = bridge(&mock, ProviderType::Google, "gemini-2.0-flash").await;
    let mut stream = bridge.invoke_stream(&Prompt::user("Hello"), None).await.unwrap();

    let mut usage_chunks = 0;
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        text.push_str(chunk.text_content());
        if let Some(usage) = chunk.usage {
            usage_chunks += 1;
            assert_eq!(usage, Usage::new(4, 2));
        }
    }

    assert_eq!(text, "Bonjour");
    assert_eq!(usage_chunks, 1);
    assert_eq!(mock.single_request().query.as_deref(), Some("alt=sse"));
}

#[tokio::test]
async fn ollama_ndjson_lines() {
    let mock = MockProvider::start().await.unwrap();
    let lines = [
        json!({"model": "llama3.2", "message": {"role": "assistant", "content": "Hi"}, "done": false}),
        json!({"model": "llama3.2", "message": {"role": "assistant", "content": " there"}, "done": false}),
        json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": ""},
            "done": true,
            "done_reason": "stop",
            "prompt_eval_count": 6,
            "eval_count": 2
        }),
    ];
    mock.on("/api/chat", Reply::ndjson(&lines));

    let bridge = bridge(&mock, ProviderType::Ollama, "llama3.2").await;
    let stream = bridge.invoke_stream(&Prompt::user("Hello"), None).await.unwrap();
    let collected = collect(stream).await;

    assert!(collected.error.is_none());
    assert_eq!(collected.text, "Hi there");
    assert_eq!(collected.usage, Some(Usage::new(6, 2)));
    assert_eq!(mock.single_request().body["stream"], true);
}

#[tokio::test]
async fn dropping_stream_releases_connection() {
    let mock = MockProvider::start().await.unwrap();
    let released = Arc::new(AtomicBool::new(false));
    mock.on("/v1/messages", Reply::endless_anthropic("First", Arc::clone(&released)));

    let bridge = bridge(&mock, ProviderType::Anthropic, "claude-sonnet-4-5").await;
    let mut stream = bridge.invoke_stream(&Prompt::user("Hi"), None).await.unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.text_content(), "First");
    assert!(!released.load(Ordering::SeqCst));

    drop(stream);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !released.load(Ordering::SeqCst) {
        assert!(tokio::time::Instant::now() < deadline, "upstream body was never released");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
