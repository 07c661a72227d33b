//! Anthropic Messages API wire format

use serde::{Deserialize, Serialize};

use super::ErrorDetail;

// -- Request --

/// `POST /v1/messages` body
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    /// Model identifier
    pub model: String,
    /// Maximum tokens to generate (required)
    pub max_tokens: u32,
    /// System prompt, outside the turn sequence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Alternating user/assistant turns
    pub messages: Vec<MessageParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolParam>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoiceParam>,
    /// Extended thinking configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingParam>,
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageParam {
    /// "user" or "assistant"
    pub role: String,
    /// Content blocks
    pub content: Vec<ContentBlockParam>,
}

/// Content block within a request turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockParam {
    /// Text
    Text { text: String },
    /// Inline image
    Image { source: Base64Source },
    /// Inline document (PDF)
    Document { source: Base64Source },
    /// Tool call previously issued by the assistant
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Result of a tool call
    ToolResult { tool_use_id: String, content: String },
}

/// Base64-encoded inline data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Base64Source {
    /// Always "base64"
    #[serde(rename = "type")]
    pub source_type: &'static str,
    /// Media type (e.g. "image/png")
    pub media_type: String,
    /// Encoded bytes
    pub data: String,
}

/// Tool definition
#[derive(Debug, Clone, Serialize)]
pub struct ToolParam {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// JSON Schema for the input
    pub input_schema: serde_json::Value,
}

/// Tool selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoiceParam {
    Auto,
    Any,
    None,
    Tool { name: String },
}

/// Extended thinking switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThinkingParam {
    /// Always "enabled"
    #[serde(rename = "type")]
    pub thinking_type: &'static str,
    /// Tokens the model may spend thinking
    pub budget_tokens: u32,
}

// -- Response --

/// Complete `POST /v1/messages` response
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Ordered content blocks
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
    /// Why generation stopped ("end_turn", "tool_use", "refusal", ...)
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// Content block in a response
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    /// Redacted thinking, server tool blocks and anything newer
    #[serde(other)]
    Other,
}

/// Token usage
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

// -- Streaming --

/// Server-sent event payload
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        message: StreamMessage,
    },
    ContentBlockStart {
        index: u32,
        content_block: StreamBlock,
    },
    ContentBlockDelta {
        index: u32,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: MessageDelta,
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: ErrorDetail,
    },
}

/// Message header carried by `message_start`
#[derive(Debug, Clone, Deserialize)]
pub struct StreamMessage {
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// Block opened by `content_block_start`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(other)]
    Other,
}

/// Incremental block content
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    #[serde(other)]
    Other,
}

/// Message-level delta
#[derive(Debug, Clone, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub stop_reason: Option<String>,
}
