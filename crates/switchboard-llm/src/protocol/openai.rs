//! `OpenAI` Chat Completions wire format
//!
//! Shared by `OpenAI`, compatible endpoints and xAI. The xAI-only fields
//! (`search_parameters`, `reasoning_content`, `citations`) are simply absent
//! for the other two.

use serde::{Deserialize, Serialize};

use crate::types::SearchParameters;

// -- Request types --

/// `POST /chat/completions` body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Replaces `max_tokens` for `OpenAI` reasoning models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Stream options (e.g. `include_usage`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatTool>>,
    /// "auto", "none", "required" or a named function
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Output format constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
    /// "low", "medium" or "high" for reasoning models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<&'static str>,
    /// xAI live search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_parameters: Option<SearchParameters>,
}

/// Stream options
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StreamOptions {
    /// Append a usage-only chunk before `[DONE]`
    pub include_usage: bool,
}

/// One request message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// "system", "user", "assistant" or "tool"
    pub role: &'static str,
    /// String or array of content parts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ChatContent>,
    /// Tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    /// Tool call this message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Plain string or multimodal parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Multimodal content part
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageUrl {
    /// `data:` URI carrying base64 bytes
    pub url: String,
}

/// Tool definition
#[derive(Debug, Clone, Serialize)]
pub struct ChatTool {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: FunctionDef,
}

/// Function specification
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// JSON Schema for the arguments
    pub parameters: serde_json::Value,
}

/// Tool call carried on an assistant message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    /// Always "function"
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_owned()
}

/// Function name and JSON-encoded arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

// -- Response types --

/// Complete chat completion
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
    /// Source URLs consulted by xAI live search
    #[serde(default)]
    pub citations: Option<Vec<String>>,
}

/// One generated choice
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ChoiceMessage,
    /// Why generation stopped ("stop", "length", "tool_calls", "content_filter")
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message within a choice
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning text (xAI, some compatible servers)
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    /// Refusal text from structured-output models
    #[serde(default)]
    pub refusal: Option<String>,
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

// -- Streaming types --

/// One `chat.completion.chunk` event
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Present on the final chunk when `include_usage` is set
    #[serde(default)]
    pub usage: Option<ChatUsage>,
    /// xAI attaches citations to the final chunk
    #[serde(default)]
    pub citations: Option<Vec<String>>,
}

/// Choice within a chunk
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental message content
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub refusal: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChunkToolCall>>,
}

/// Tool call fragment
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkToolCall {
    /// Position within the `tool_calls` array
    #[serde(default)]
    pub index: u32,
    /// Present on the first fragment only
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<ChunkFunction>,
}

/// Partial function call
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}
