//! Ollama `/api/chat` mapping
//!
//! Ollama never supplies tool-call ids, so every call gets a fresh
//! synthesized one.

use serde_json::Value;

use crate::classify::{self, ClassifyContext};
use crate::convert::{
    ModelTarget, ResolvedParams, encode_base64, ensure_messages, ensure_tool_schemas, omit, render_sections,
    synthesize_call_id, value_to_arguments,
};
use crate::error::BridgeError;
use crate::protocol::ollama::{ChatMessage, ChatRequest, ChatResponse, FunctionCall, FunctionDef, Options, Tool, ToolCall};
use crate::stream::Reconstructor;
use crate::types::{self, Content, Message, Prompt, Response, ResponseFormat, Role, Usage};

const PROVIDER: &str = "ollama";

/// Build an `/api/chat` request
pub fn build_request(prompt: &Prompt, params: &ResolvedParams, target: &ModelTarget) -> Result<ChatRequest, BridgeError> {
    ensure_messages(prompt)?;
    ensure_tool_schemas(&params.tools)?;

    let format = match &params.response_format {
        Some(ResponseFormat::JsonObject) => Some(Value::String("json".to_owned())),
        Some(ResponseFormat::JsonSchema { schema, .. }) => Some(schema.clone()),
        Some(ResponseFormat::Text) | None => None,
    };

    let think = params.reasoning_effort.and_then(|_| {
        if target.reasoning {
            Some(true)
        } else {
            omit(PROVIDER, "reasoning_effort");
            None
        }
    });

    if params.tool_choice.is_some() {
        omit(PROVIDER, "tool_choice");
    }
    if params.search.is_some() {
        omit(PROVIDER, "search");
    }

    let tools = (!params.tools.is_empty()).then(|| {
        params
            .tools
            .iter()
            .map(|t| Tool {
                tool_type: "function",
                function: FunctionDef {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    });

    Ok(ChatRequest {
        model: target.model.clone(),
        messages: prompt.messages.iter().map(map_message).collect(),
        stream: false,
        tools,
        format,
        think,
        options: Options {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            num_predict: params.max_tokens,
            frequency_penalty: params.frequency_penalty,
            presence_penalty: params.presence_penalty,
            stop: params.stop_sequences.clone(),
        },
    })
}

fn map_message(message: &Message) -> ChatMessage {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool if message.tool_result.is_some() => "tool",
        Role::Tool => "user",
    };

    let mut texts = Vec::new();
    let mut images = Vec::new();
    for content in &message.content {
        match content {
            Content::Text(text) => texts.push(text.as_str()),
            Content::Image(media) => images.push(encode_base64(&media.data)),
            other => tracing::debug!(provider = PROVIDER, kind = other.kind(), "content not supported, dropped"),
        }
    }

    ChatMessage {
        role: role.to_owned(),
        content: texts.join("\n"),
        images,
        thinking: None,
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| ToolCall {
                function: FunctionCall {
                    name: call.name.clone(),
                    arguments: Value::Object(call.arguments.clone()),
                },
            })
            .collect(),
        tool_name: message.tool_result.as_ref().map(|r| r.name.clone()),
    }
}

fn tool_calls(calls: Vec<ToolCall>) -> Vec<types::ToolCall> {
    calls
        .into_iter()
        .map(|call| types::ToolCall::new(synthesize_call_id(), call.function.name, value_to_arguments(call.function.arguments)))
        .collect()
}

fn usage(response: &ChatResponse) -> Option<Usage> {
    if response.prompt_eval_count.is_none() && response.eval_count.is_none() {
        return None;
    }
    Some(Usage::new(
        response.prompt_eval_count.unwrap_or_default(),
        response.eval_count.unwrap_or_default(),
    ))
}

/// Map a complete `/api/chat` response
pub fn parse_response(response: ChatResponse, ctx: &ClassifyContext) -> Result<Response, BridgeError> {
    if let Some(error) = response.error {
        return Err(classify::from_code(None, error, None, ctx));
    }

    let usage = usage(&response);
    let message = response.message.unwrap_or_default();
    let mut text = message.content;
    let sections = render_sections(!text.is_empty(), message.thinking.as_deref().unwrap_or_default(), &[]);
    text.push_str(&sections);

    Ok(Response {
        content: Content::Text(text),
        usage,
        tool_calls: tool_calls(message.tool_calls),
    })
}

/// Streaming reconstructor for NDJSON lines
pub struct OllamaStream {
    ctx: ClassifyContext,
    reasoning: String,
    has_text: bool,
}

impl OllamaStream {
    /// Fresh state for one stream
    pub const fn new(ctx: ClassifyContext) -> Self {
        Self {
            ctx,
            reasoning: String::new(),
            has_text: false,
        }
    }
}

impl Reconstructor for OllamaStream {
    type Frame = ChatResponse;

    fn on_frame(&mut self, frame: ChatResponse) -> Vec<Result<Response, BridgeError>> {
        if let Some(error) = frame.error {
            return vec![Err(classify::from_code(None, error, None, &self.ctx))];
        }

        let mut out = Vec::new();
        let usage = if frame.done { usage(&frame) } else { None };

        if let Some(message) = frame.message {
            if let Some(thinking) = message.thinking {
                self.reasoning.push_str(&thinking);
            }
            if !message.content.is_empty() {
                self.has_text = true;
                out.push(Ok(Response::text(message.content)));
            }
            out.extend(
                tool_calls(message.tool_calls)
                    .into_iter()
                    .map(|call| Ok(Response::from_tool_calls(vec![call]))),
            );
        }

        if let Some(usage) = usage {
            out.push(Ok(Response::from_usage(usage)));
        }
        out
    }

    fn finish(&mut self) -> Vec<Result<Response, BridgeError>> {
        let sections = render_sections(self.has_text, &self.reasoning, &[]);
        if sections.is_empty() {
            Vec::new()
        } else {
            vec![Ok(Response::text(sections))]
        }
    }
}
