//! Chat Completions mapping for `OpenAI`, compatible endpoints and xAI

use serde_json::json;
use switchboard_config::SystemPromptMode;

use crate::classify::ClassifyContext;
use crate::convert::{
    FALLBACK_IMAGE_MEDIA_TYPE, ModelTarget, ResolvedParams, ToolCallBuffer, arguments_to_string, encode_base64,
    ensure_messages, ensure_tool_schemas, media_type, omit, parse_arguments, render_sections, synthesize_call_id,
};
use crate::error::BridgeError;
use crate::protocol::openai::{
    ChatChunk, ChatContent, ChatMessage, ChatRequest, ChatResponse, ChatTool, ChatToolCall, ChatUsage, ContentPart,
    FunctionCall, FunctionDef, ImageUrl,
};
use crate::provider::ProviderKind;
use crate::stream::Reconstructor;
use crate::types::{Content, Message, Prompt, Response, ResponseFormat, Role, ToolCall, ToolChoice, Usage};

/// Finish reason signalling a moderation block
const CONTENT_FILTER: &str = "content_filter";

/// Which flavor of the Chat Completions format is spoken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// `OpenAi`, `OpenAiCompatible` or `Xai`
    pub provider: ProviderKind,
    /// How system messages are carried
    pub system_prompt: SystemPromptMode,
}

impl Dialect {
    /// Native system role for the given provider
    pub const fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            system_prompt: SystemPromptMode::Native,
        }
    }

    const fn name(self) -> &'static str {
        self.provider.as_str()
    }
}

/// Build a Chat Completions request
///
/// System messages keep their position unless the dialect asks for their
/// text to be prepended to the first non-system message.
pub fn build_request(
    prompt: &Prompt,
    params: &ResolvedParams,
    target: &ModelTarget,
    dialect: Dialect,
) -> Result<ChatRequest, BridgeError> {
    ensure_messages(prompt)?;
    ensure_tool_schemas(&params.tools)?;

    let provider = dialect.name();
    let messages = match dialect.system_prompt {
        SystemPromptMode::Native => prompt.messages.iter().map(|m| map_message(m, provider)).collect(),
        SystemPromptMode::Prepend => prepend_system(prompt, provider),
    };

    if params.top_k.is_some() {
        omit(provider, "top_k");
    }

    // o-series models reject `max_tokens`
    let (max_tokens, max_completion_tokens) = if dialect.provider == ProviderKind::OpenAi && target.reasoning {
        (None, params.max_tokens)
    } else {
        (params.max_tokens, None)
    };

    let reasoning_effort = params.reasoning_effort.and_then(|effort| {
        if target.reasoning || dialect.provider == ProviderKind::OpenAiCompatible {
            Some(effort.as_str())
        } else {
            omit(provider, "reasoning_effort");
            None
        }
    });

    let search_parameters = params.search.clone().and_then(|search| {
        if dialect.provider == ProviderKind::Xai {
            Some(search)
        } else {
            omit(provider, "search");
            None
        }
    });

    let (tools, tool_choice) = if params.tools.is_empty() {
        (None, None)
    } else {
        let tools = params
            .tools
            .iter()
            .map(|t| ChatTool {
                tool_type: "function",
                function: FunctionDef {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect();
        (Some(tools), params.tool_choice.as_ref().map(tool_choice_value))
    };

    Ok(ChatRequest {
        model: target.model.clone(),
        messages,
        temperature: params.temperature,
        top_p: params.top_p,
        max_tokens,
        max_completion_tokens,
        stop: params.stop_sequences.clone(),
        frequency_penalty: params.frequency_penalty,
        presence_penalty: params.presence_penalty,
        stream: None,
        stream_options: None,
        tools,
        tool_choice,
        response_format: params.response_format.as_ref().map(response_format_value),
        reasoning_effort,
        search_parameters,
    })
}

fn tool_choice_value(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Tool(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

fn response_format_value(format: &ResponseFormat) -> serde_json::Value {
    match format {
        ResponseFormat::Text => json!({"type": "text"}),
        ResponseFormat::JsonObject => json!({"type": "json_object"}),
        ResponseFormat::JsonSchema { name, schema } => {
            json!({"type": "json_schema", "json_schema": {"name": name, "schema": schema}})
        }
    }
}

/// Fold system text into the first non-system message
fn prepend_system(prompt: &Prompt, provider: &str) -> Vec<ChatMessage> {
    let mut system = prompt.system_text();
    prompt
        .turns()
        .map(|message| {
            let mut mapped = map_message(message, provider);
            if let Some(system) = system.take() {
                mapped.content = Some(match mapped.content {
                    Some(ChatContent::Text(text)) => ChatContent::Text(join_blank_line(&system, &text)),
                    Some(ChatContent::Parts(mut parts)) => {
                        parts.insert(0, ContentPart::Text { text: system });
                        ChatContent::Parts(parts)
                    }
                    None => ChatContent::Text(system),
                });
            }
            mapped
        })
        .collect()
}

fn join_blank_line(head: &str, tail: &str) -> String {
    if tail.is_empty() {
        head.to_owned()
    } else {
        format!("{head}\n\n{tail}")
    }
}

fn map_message(message: &Message, provider: &str) -> ChatMessage {
    match message.role {
        Role::System => ChatMessage {
            role: "system",
            content: Some(ChatContent::Text(message.text())),
            tool_calls: None,
            tool_call_id: None,
        },
        Role::Tool => ChatMessage {
            role: if message.tool_result.is_some() { "tool" } else { "user" },
            content: Some(ChatContent::Text(message.text())),
            tool_calls: None,
            tool_call_id: message.tool_result.as_ref().map(|r| r.tool_call_id.clone()),
        },
        Role::Assistant => {
            let text = message.text();
            let tool_calls: Vec<ChatToolCall> = message
                .tool_calls
                .iter()
                .map(|call| ChatToolCall {
                    id: call.id.clone(),
                    tool_type: "function".to_owned(),
                    function: FunctionCall {
                        name: call.name.clone(),
                        arguments: arguments_to_string(&call.arguments),
                    },
                })
                .collect();
            ChatMessage {
                role: "assistant",
                content: (!text.is_empty() || tool_calls.is_empty()).then_some(ChatContent::Text(text)),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            }
        }
        Role::User => ChatMessage {
            role: "user",
            content: Some(user_content(&message.content, provider)),
            tool_calls: None,
            tool_call_id: None,
        },
    }
}

/// Plain string unless images are present
fn user_content(content: &[Content], provider: &str) -> ChatContent {
    if !content.iter().any(|c| matches!(c, Content::Image(_))) {
        let texts: Vec<&str> = content.iter().filter_map(Content::as_text).collect();
        for dropped in content.iter().filter(|c| c.as_text().is_none()) {
            tracing::debug!(provider, kind = dropped.kind(), "content not supported, dropped");
        }
        return ChatContent::Text(texts.join("\n"));
    }

    let parts = content
        .iter()
        .filter_map(|c| match c {
            Content::Text(text) => Some(ContentPart::Text { text: text.clone() }),
            Content::Image(media) => Some(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!(
                        "data:{};base64,{}",
                        media_type(media, FALLBACK_IMAGE_MEDIA_TYPE),
                        encode_base64(&media.data)
                    ),
                },
            }),
            other => {
                tracing::debug!(provider, kind = other.kind(), "content not supported, dropped");
                None
            }
        })
        .collect();
    ChatContent::Parts(parts)
}

/// Map a complete chat completion
///
/// Only the first choice is read. A `content_filter` finish with no output,
/// or an explicit refusal, fails the call.
pub fn parse_response(response: ChatResponse) -> Result<Response, BridgeError> {
    let usage = response.usage.map(usage);
    let citations = response.citations.unwrap_or_default();

    let Some(choice) = response.choices.into_iter().next() else {
        return Ok(Response {
            usage,
            ..Response::default()
        });
    };
    let message = choice.message;

    if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
        tracing::warn!("response refused by safety system");
        return Err(BridgeError::blocked(refusal));
    }

    let mut text = message.content.unwrap_or_default();
    let tool_calls: Vec<ToolCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let id = if call.id.is_empty() { synthesize_call_id() } else { call.id };
            ToolCall::new(id, call.function.name, parse_arguments(&call.function.arguments))
        })
        .collect();

    if choice.finish_reason.as_deref() == Some(CONTENT_FILTER) && text.is_empty() && tool_calls.is_empty() {
        tracing::warn!("response blocked by content filter");
        return Err(BridgeError::blocked("response blocked by content filter"));
    }

    let reasoning = message.reasoning_content.unwrap_or_default();
    let sections = render_sections(!text.is_empty(), &reasoning, &citations);
    text.push_str(&sections);

    Ok(Response {
        content: Content::Text(text),
        usage,
        tool_calls,
    })
}

const fn usage(usage: ChatUsage) -> Usage {
    Usage::new(usage.prompt_tokens, usage.completion_tokens)
}

/// Streaming reconstructor for `chat.completion.chunk` events
///
/// Reasoning text and citations are held back and emitted as one trailing
/// section chunk once the stream ends.
pub struct ChatStream {
    ctx: ClassifyContext,
    tools: ToolCallBuffer,
    reasoning: String,
    refusal: String,
    citations: Vec<String>,
    has_text: bool,
}

impl ChatStream {
    /// Fresh state for one stream
    pub fn new(ctx: ClassifyContext) -> Self {
        Self {
            ctx,
            tools: ToolCallBuffer::default(),
            reasoning: String::new(),
            refusal: String::new(),
            citations: Vec::new(),
            has_text: false,
        }
    }

    /// Accumulated refusal as a blocked error, consuming the buffer
    fn take_refusal(&mut self) -> Option<BridgeError> {
        if self.refusal.is_empty() {
            return None;
        }
        tracing::warn!(provider = %self.ctx.provider, "stream refused by model");
        Some(BridgeError::blocked(std::mem::take(&mut self.refusal)))
    }

    fn emit_calls(calls: Vec<ToolCall>, out: &mut Vec<Result<Response, BridgeError>>) {
        out.extend(calls.into_iter().map(|call| Ok(Response::from_tool_calls(vec![call]))));
    }
}

impl Reconstructor for ChatStream {
    type Frame = ChatChunk;

    fn on_frame(&mut self, frame: ChatChunk) -> Vec<Result<Response, BridgeError>> {
        let mut out = Vec::new();

        if let Some(choice) = frame.choices.into_iter().find(|c| c.index == 0) {
            let delta = choice.delta;

            if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                self.has_text = true;
                out.push(Ok(Response::text(text)));
            }
            if let Some(reasoning) = delta.reasoning_content {
                self.reasoning.push_str(&reasoning);
            }
            if let Some(refusal) = delta.refusal {
                self.refusal.push_str(&refusal);
            }
            for call in delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = call.function.map(|f| (f.name, f.arguments)).unwrap_or_default();
                if call.id.is_some() && !self.tools.contains(call.index) {
                    Self::emit_calls(self.tools.finish_before(call.index), &mut out);
                }
                self.tools.start(call.index, call.id, name);
                if let Some(arguments) = arguments {
                    self.tools.push_arguments(call.index, &arguments);
                }
            }

            if let Some(reason) = choice.finish_reason.as_deref() {
                Self::emit_calls(self.tools.drain(), &mut out);
                if let Some(err) = self.take_refusal() {
                    out.push(Err(err));
                    return out;
                }
                if reason == CONTENT_FILTER && !self.has_text && out.is_empty() {
                    tracing::warn!(provider = %self.ctx.provider, "stream blocked by content filter");
                    out.push(Err(BridgeError::blocked("response blocked by content filter")));
                    return out;
                }
            }
        }

        if let Some(citations) = frame.citations.filter(|c| !c.is_empty()) {
            self.citations = citations;
        }
        if let Some(u) = frame.usage {
            out.push(Ok(Response::from_usage(usage(u))));
        }

        out
    }

    fn finish(&mut self) -> Vec<Result<Response, BridgeError>> {
        let mut out = Vec::new();
        Self::emit_calls(self.tools.drain(), &mut out);
        if let Some(err) = self.take_refusal() {
            out.push(Err(err));
            return out;
        }

        let sections = render_sections(self.has_text, &self.reasoning, &self.citations);
        if !sections.is_empty() {
            out.push(Ok(Response::text(sections)));
        }
        out
    }
}
