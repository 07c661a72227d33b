//! Non-streaming invocation against each provider family

mod harness;

use harness::config::{bridge, bridge_config};
use harness::mock_provider::{MockProvider, Reply};
use serde_json::json;
use switchboard_config::ProviderType;
use switchboard_llm::{Bridge, InvokeOptions, Message, Prompt, ToolChoice, ToolDeclaration, Usage};

fn weather_tool() -> ToolDeclaration {
    ToolDeclaration::new(
        "get_weather",
        "Get current weather",
        json!({"type": "object", "properties": {"location": {"type": "string"}}}),
    )
}

#[tokio::test]
async fn openai_text_completion() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/chat/completions",
        Reply::json(&json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello from mock"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })),
    );

    let bridge = bridge(&mock, ProviderType::Openai, "gpt-4o").await;
    let prompt = Prompt::new(vec![Message::system("Be brief."), Message::user("Hello")]);
    let response = bridge.invoke(&prompt, None).await.unwrap();

    assert_eq!(response.text_content(), "Hello from mock");
    assert_eq!(response.usage, Some(Usage::new(10, 5)));

    let request = mock.single_request();
    assert_eq!(request.headers["authorization"], "Bearer test-key");
    assert_eq!(request.body["model"], "gpt-4o");
    assert_eq!(
        request.body["messages"],
        json!([
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": "Hello"}
        ])
    );
    assert!(request.body.get("stream").is_none_or(|s| s == false));
}

#[tokio::test]
async fn openai_tool_call_round_trip() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/chat/completions",
        Reply::json(&json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"location\":\"Oslo\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })),
    );

    let bridge = bridge(&mock, ProviderType::Openai, "gpt-4o").await;
    let options = InvokeOptions {
        tools: vec![weather_tool()],
        tool_choice: Some(ToolChoice::Required),
        ..InvokeOptions::default()
    };
    let response = bridge
        .invoke(&Prompt::user("Weather in Oslo?"), Some(&options))
        .await
        .unwrap();

    assert_eq!(response.text_content(), "");
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].id, "call_1");
    assert_eq!(response.tool_calls[0].name, "get_weather");
    assert_eq!(response.tool_calls[0].arguments["location"], "Oslo");

    let body = mock.single_request().body;
    assert_eq!(body["tool_choice"], "required");
    assert_eq!(body["tools"][0]["type"], "function");
    assert_eq!(body["tools"][0]["function"]["name"], "get_weather");
}

#[tokio::test]
async fn anthropic_hoists_system_and_sends_version() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/messages",
        Reply::json(&json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5",
            "content": [
                {"type": "text", "text": "Checking."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "Oslo"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 7}
        })),
    );

    let bridge = bridge(&mock, ProviderType::Anthropic, "claude-sonnet-4-5").await;
    let prompt = Prompt::new(vec![Message::system("Be brief."), Message::user("Weather in Oslo?")]);
    let options = InvokeOptions {
        tools: vec![weather_tool()],
        ..InvokeOptions::default()
    };
    let response = bridge.invoke(&prompt, Some(&options)).await.unwrap();

    assert_eq!(response.text_content(), "Checking.");
    assert_eq!(response.tool_calls[0].id, "toolu_1");
    assert_eq!(response.tool_calls[0].arguments["location"], "Oslo");
    assert_eq!(response.usage, Some(Usage::new(12, 7)));

    let request = mock.single_request();
    assert_eq!(request.headers["x-api-key"], "test-key");
    assert_eq!(request.headers["anthropic-version"], "2023-06-01");
    assert_eq!(request.body["system"], "Be brief.");
    assert_eq!(request.body["messages"][0]["role"], "user");
    assert!(request.body["max_tokens"].as_u64().is_some_and(|n| n > 0));
    assert_eq!(request.body["tools"][0]["name"], "get_weather");
}

#[tokio::test]
async fn anthropic_refusal_is_blocked() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/messages",
        Reply::json(&json!({"content": [], "stop_reason": "refusal"})),
    );

    let bridge = bridge(&mock, ProviderType::Anthropic, "claude-sonnet-4-5").await;
    let err = bridge.invoke(&Prompt::user("Hi"), None).await.unwrap_err();
    assert!(err.is_blocked());
}

#[tokio::test]
async fn gemini_generate_content() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1beta/models/gemini-2.0-flash:generateContent",
        Reply::json(&json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Bonjour"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
        })),
    );

    let bridge = bridge(&mock, ProviderType::Google, "gemini-2.0-flash").await;
    let prompt = Prompt::new(vec![Message::system("Answer in French."), Message::user("Hello")]);
    let response = bridge.invoke(&prompt, None).await.unwrap();

    assert_eq!(response.text_content(), "Bonjour");
    assert_eq!(response.usage, Some(Usage::new(4, 2)));

    let request = mock.single_request();
    assert_eq!(request.headers["x-goog-api-key"], "test-key");
    assert_eq!(request.body["contents"][0]["role"], "user");
    assert_eq!(request.body["contents"][0]["parts"][0]["text"], "Hello");
    assert!(request.body.get("systemInstruction").is_some());
}

#[tokio::test]
async fn gemini_safety_block_without_output() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1beta/models/gemini-2.0-flash:generateContent",
        Reply::json(&json!({"candidates": [], "promptFeedback": {"blockReason": "SAFETY"}})),
    );

    let bridge = bridge(&mock, ProviderType::Google, "gemini-2.0-flash").await;
    let err = bridge.invoke(&Prompt::user("Hi"), None).await.unwrap_err();
    assert!(err.is_blocked());
}

#[tokio::test]
async fn ollama_chat() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/api/chat",
        Reply::json(&json!({
            "model": "llama3.2",
            "message": {"role": "assistant", "content": "Hi there"},
            "done": true,
            "done_reason": "stop",
            "prompt_eval_count": 8,
            "eval_count": 3
        })),
    );

    let bridge = bridge(&mock, ProviderType::Ollama, "llama3.2").await;
    let options = InvokeOptions {
        temperature: Some(0.3),
        max_tokens: Some(64),
        ..InvokeOptions::default()
    };
    let response = bridge.invoke(&Prompt::user("Hello"), Some(&options)).await.unwrap();

    assert_eq!(response.text_content(), "Hi there");
    assert_eq!(response.usage, Some(Usage::new(8, 3)));

    let body = mock.single_request().body;
    assert_eq!(body["model"], "llama3.2");
    assert_eq!(body["stream"], false);
    assert_eq!(body["options"]["num_predict"], 64);
}

#[tokio::test]
async fn configured_headers_are_sent() {
    let mock = MockProvider::start().await.unwrap();
    mock.on(
        "/v1/chat/completions",
        Reply::json(&json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": "ok"}}]})),
    );

    let mut config = bridge_config(&mock, ProviderType::OpenaiCompatible, "local-model");
    config.headers.insert("x-team".to_owned(), "research".to_owned());
    let bridge = Bridge::new("compat", &config).await.unwrap();

    let response = bridge.invoke(&Prompt::user("Hi"), None).await.unwrap();
    assert_eq!(response.text_content(), "ok");
    assert_eq!(mock.single_request().headers["x-team"], "research");
}
