use serde::{Deserialize, Serialize};

use super::tool::ToolCall;

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool result
    Tool,
}

/// Binary payload with an optional declared media type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Raw bytes
    pub data: Vec<u8>,
    /// Declared media type (e.g. "image/png")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl Media {
    /// Wrap raw bytes without a declared media type
    pub const fn new(data: Vec<u8>) -> Self {
        Self { data, media_type: None }
    }

    /// Declare the media type
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

/// One entry of a message's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Content {
    /// Text
    Text(String),
    /// Image bytes
    Image(Media),
    /// Audio bytes
    Audio(Media),
    /// Video bytes
    Video(Media),
    /// Arbitrary document bytes
    File(Media),
}

impl Content {
    /// Text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Image content without a declared media type
    pub const fn image(data: Vec<u8>) -> Self {
        Self::Image(Media::new(data))
    }

    /// The text, if this is a text entry
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image(_) | Self::Audio(_) | Self::Video(_) | Self::File(_) => None,
        }
    }

    /// Lowercase tag name
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Audio(_) => "audio",
            Self::Video(_) => "video",
            Self::File(_) => "file",
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// Correlates a tool message with the call it answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultRef {
    /// Name of the tool that produced the result
    pub name: String,
    /// Id of the tool call being answered
    pub tool_call_id: String,
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author role
    pub role: Role,
    /// Ordered content entries
    pub content: Vec<Content>,
    /// Tool calls issued by an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Correlation for tool-role messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResultRef>,
}

impl Message {
    /// Message with arbitrary content entries
    pub const fn new(role: Role, content: Vec<Content>) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_result: None,
        }
    }

    /// System instruction
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Content::text(text)])
    }

    /// User text message
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Content::text(text)])
    }

    /// Assistant text message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Content::text(text)])
    }

    /// Tool result answering a previous call
    pub fn tool(name: impl Into<String>, tool_call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_result: Some(ToolResultRef {
                name: name.into(),
                tool_call_id: tool_call_id.into(),
            }),
            ..Self::new(Role::Tool, vec![Content::text(output)])
        }
    }

    /// Attach the tool calls an assistant turn issued
    #[must_use]
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// All text entries joined with a newline, non-text entries skipped
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Content::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Ordered conversation passed to a bridge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Messages in conversation order
    pub messages: Vec<Message>,
}

impl Prompt {
    /// Prompt from a list of messages
    pub const fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Single user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(vec![Message::user(text)])
    }

    /// Concatenated text of every system message, joined by a blank line
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<String> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(Message::text)
            .filter(|t| !t.is_empty())
            .collect();

        if parts.is_empty() { None } else { Some(parts.join("\n\n")) }
    }

    /// Messages other than system instructions, in order
    pub fn turns(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }
}

impl From<Vec<Message>> for Prompt {
    fn from(messages: Vec<Message>) -> Self {
        Self::new(messages)
    }
}
