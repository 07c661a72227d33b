use serde::{Deserialize, Serialize};

use super::content::Content;
use super::tool::ToolCall;

/// Token accounting for one invocation
///
/// `total_tokens` is always the sum of the other two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated
    pub completion_tokens: u32,
    /// Prompt plus completion
    pub total_tokens: u32,
}

impl Usage {
    /// Build usage, deriving the total
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// A complete response, or one streamed chunk of one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Generated content (text for every current provider)
    pub content: Content,
    /// Token usage, absent when the provider reports none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Tool calls requested by the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Response {
    /// Text-only response
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Content::Text(text.into()),
            ..Self::default()
        }
    }

    /// Usage-only chunk
    pub fn from_usage(usage: Usage) -> Self {
        Self {
            usage: Some(usage),
            ..Self::default()
        }
    }

    /// Tool-call chunk with empty text
    pub fn from_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    /// The text content, empty for non-text content
    pub fn text_content(&self) -> &str {
        self.content.as_text().unwrap_or_default()
    }

    /// Whether the chunk carries nothing worth yielding
    pub fn is_empty(&self) -> bool {
        self.text_content().is_empty() && self.usage.is_none() && self.tool_calls.is_empty()
    }
}
