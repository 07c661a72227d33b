//! Anthropic Messages API mapping

use crate::classify::{self, ClassifyContext};
use crate::convert::{
    FALLBACK_IMAGE_MEDIA_TYPE, ModelTarget, ResolvedParams, ToolCallBuffer, encode_base64, ensure_messages,
    ensure_tool_schemas, media_type, omit, render_sections, thinking_budget, value_to_arguments,
};
use crate::error::BridgeError;
use crate::protocol::anthropic::{
    AnthropicUsage, Base64Source, BlockDelta, ContentBlockParam, MessageParam, MessagesRequest, MessagesResponse,
    ResponseBlock, StreamBlock, StreamEvent, ThinkingParam, ToolChoiceParam, ToolParam,
};
use crate::stream::Reconstructor;
use crate::types::{Content, Message, Prompt, Response, Role, ToolCall, ToolChoice, Usage};

const PROVIDER: &str = "anthropic";

/// Build a Messages API request
///
/// All system messages are joined into the top-level `system` field. Tool
/// results become `tool_result` blocks in a user turn, and consecutive turns
/// with the same role are merged since the API requires alternation.
pub fn build_request(
    prompt: &Prompt,
    params: &ResolvedParams,
    target: &ModelTarget,
) -> Result<MessagesRequest, BridgeError> {
    ensure_messages(prompt)?;
    ensure_tool_schemas(&params.tools)?;

    let mut messages: Vec<MessageParam> = Vec::new();
    for message in prompt.turns() {
        let (role, blocks) = map_message(message);
        if blocks.is_empty() {
            tracing::debug!(provider = PROVIDER, "dropping turn with no representable content");
            continue;
        }
        match messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => messages.push(MessageParam {
                role: role.to_owned(),
                content: blocks,
            }),
        }
    }

    let max_tokens = params.max_tokens.unwrap_or(target.max_output_tokens);
    let thinking = thinking_param(params, target, max_tokens);

    let (temperature, top_k) = if thinking.is_some() {
        if params.temperature.is_some() {
            omit(PROVIDER, "temperature");
        }
        if params.top_k.is_some() {
            omit(PROVIDER, "top_k");
        }
        (None, None)
    } else {
        (params.temperature, params.top_k)
    };

    if params.frequency_penalty.is_some() {
        omit(PROVIDER, "frequency_penalty");
    }
    if params.presence_penalty.is_some() {
        omit(PROVIDER, "presence_penalty");
    }
    if params.response_format.is_some() {
        omit(PROVIDER, "response_format");
    }
    if params.search.is_some() {
        omit(PROVIDER, "search");
    }

    let (tools, tool_choice) = if params.tools.is_empty() {
        (None, None)
    } else {
        let tools = params
            .tools
            .iter()
            .map(|t| ToolParam {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect();
        let choice = params.tool_choice.as_ref().map(|choice| match choice {
            ToolChoice::Auto => ToolChoiceParam::Auto,
            ToolChoice::None => ToolChoiceParam::None,
            ToolChoice::Required => ToolChoiceParam::Any,
            ToolChoice::Tool(name) => ToolChoiceParam::Tool { name: name.clone() },
        });
        (Some(tools), choice)
    };

    Ok(MessagesRequest {
        model: target.model.clone(),
        max_tokens,
        system: prompt.system_text(),
        messages,
        temperature,
        top_p: params.top_p,
        top_k,
        stop_sequences: params.stop_sequences.clone(),
        stream: None,
        tools,
        tool_choice,
        thinking,
    })
}

fn thinking_param(params: &ResolvedParams, target: &ModelTarget, max_tokens: u32) -> Option<ThinkingParam> {
    let effort = params.reasoning_effort?;
    if !target.reasoning {
        omit(PROVIDER, "reasoning_effort");
        return None;
    }

    thinking_budget(effort, max_tokens).map(|budget_tokens| ThinkingParam {
        thinking_type: "enabled",
        budget_tokens,
    })
}

fn map_message(message: &Message) -> (&'static str, Vec<ContentBlockParam>) {
    if message.role == Role::Tool
        && let Some(result) = &message.tool_result
    {
        return (
            "user",
            vec![ContentBlockParam::ToolResult {
                tool_use_id: result.tool_call_id.clone(),
                content: message.text(),
            }],
        );
    }

    let role = if message.role == Role::Assistant { "assistant" } else { "user" };

    let mut blocks: Vec<ContentBlockParam> = message.content.iter().filter_map(map_content).collect();
    blocks.extend(message.tool_calls.iter().map(|call| ContentBlockParam::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        input: serde_json::Value::Object(call.arguments.clone()),
    }));

    (role, blocks)
}

fn map_content(content: &Content) -> Option<ContentBlockParam> {
    match content {
        Content::Text(text) if text.is_empty() => None,
        Content::Text(text) => Some(ContentBlockParam::Text { text: text.clone() }),
        Content::Image(media) => Some(ContentBlockParam::Image {
            source: Base64Source {
                source_type: "base64",
                media_type: media_type(media, FALLBACK_IMAGE_MEDIA_TYPE),
                data: encode_base64(&media.data),
            },
        }),
        Content::File(media) if media_type(media, "").as_str() == "application/pdf" => {
            Some(ContentBlockParam::Document {
                source: Base64Source {
                    source_type: "base64",
                    media_type: "application/pdf".to_owned(),
                    data: encode_base64(&media.data),
                },
            })
        }
        Content::Audio(_) | Content::Video(_) | Content::File(_) => {
            tracing::debug!(provider = PROVIDER, kind = content.kind(), "content not supported, dropped");
            None
        }
    }
}

/// Map a complete Messages API response
///
/// A `refusal` stop reason is a safety block and fails the call.
pub fn parse_response(response: MessagesResponse) -> Result<Response, BridgeError> {
    if response.stop_reason.as_deref() == Some("refusal") {
        tracing::warn!(provider = PROVIDER, "response refused by safety system");
        return Err(BridgeError::blocked("the model refused to respond"));
    }

    let mut text = String::new();
    let mut reasoning: Vec<String> = Vec::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            ResponseBlock::Text { text: t } => text.push_str(&t),
            ResponseBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall::new(id, name, value_to_arguments(input)));
            }
            ResponseBlock::Thinking { thinking } if !thinking.is_empty() => reasoning.push(thinking),
            ResponseBlock::Thinking { .. } | ResponseBlock::Other => {}
        }
    }

    let sections = render_sections(!text.is_empty(), &reasoning.join("\n\n"), &[]);
    text.push_str(&sections);

    Ok(Response {
        content: Content::Text(text),
        usage: response.usage.map(usage),
        tool_calls,
    })
}

const fn usage(usage: AnthropicUsage) -> Usage {
    Usage::new(usage.input_tokens, usage.output_tokens)
}

/// Streaming reconstructor for Messages API events
pub struct AnthropicStream {
    ctx: ClassifyContext,
    tools: ToolCallBuffer,
    reasoning: Vec<String>,
    has_text: bool,
    input_tokens: u32,
}

impl AnthropicStream {
    /// Fresh state for one stream
    pub fn new(ctx: ClassifyContext) -> Self {
        Self {
            ctx,
            tools: ToolCallBuffer::default(),
            reasoning: Vec::new(),
            has_text: false,
            input_tokens: 0,
        }
    }

    fn text(&mut self, text: String) -> Vec<Result<Response, BridgeError>> {
        if text.is_empty() {
            return Vec::new();
        }
        self.has_text = true;
        vec![Ok(Response::text(text))]
    }

    fn push_reasoning(&mut self, fragment: &str) {
        match self.reasoning.last_mut() {
            Some(open) => open.push_str(fragment),
            None => self.reasoning.push(fragment.to_owned()),
        }
    }
}

impl Reconstructor for AnthropicStream {
    type Frame = StreamEvent;

    fn on_frame(&mut self, frame: StreamEvent) -> Vec<Result<Response, BridgeError>> {
        match frame {
            StreamEvent::MessageStart { message } => {
                self.input_tokens = message.usage.map_or(0, |u| u.input_tokens);
                Vec::new()
            }
            StreamEvent::ContentBlockStart { index, content_block } => match content_block {
                StreamBlock::Text { text } => self.text(text),
                StreamBlock::ToolUse { id, name } => {
                    self.tools.start(index, Some(id), Some(name));
                    Vec::new()
                }
                StreamBlock::Thinking { thinking } => {
                    self.reasoning.push(thinking);
                    Vec::new()
                }
                StreamBlock::Other => Vec::new(),
            },
            StreamEvent::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => self.text(text),
                BlockDelta::InputJsonDelta { partial_json } => {
                    self.tools.push_arguments(index, &partial_json);
                    Vec::new()
                }
                BlockDelta::ThinkingDelta { thinking } => {
                    self.push_reasoning(&thinking);
                    Vec::new()
                }
                BlockDelta::Other => Vec::new(),
            },
            StreamEvent::ContentBlockStop { index } => self
                .tools
                .finish(index)
                .map(|call| vec![Ok(Response::from_tool_calls(vec![call]))])
                .unwrap_or_default(),
            StreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.as_deref() == Some("refusal") {
                    tracing::warn!(provider = PROVIDER, "stream refused by safety system");
                    return vec![Err(BridgeError::blocked("the model refused to respond"))];
                }
                usage
                    .map(|u| {
                        let input = if u.input_tokens > 0 { u.input_tokens } else { self.input_tokens };
                        vec![Ok(Response::from_usage(Usage::new(input, u.output_tokens)))]
                    })
                    .unwrap_or_default()
            }
            StreamEvent::MessageStop | StreamEvent::Ping => Vec::new(),
            StreamEvent::Error { error } => {
                let message = error.message.unwrap_or_else(|| "stream error".to_owned());
                vec![Err(classify::from_code(error.error_type.as_deref(), message, None, &self.ctx))]
            }
        }
    }

    fn finish(&mut self) -> Vec<Result<Response, BridgeError>> {
        let mut out: Vec<Result<Response, BridgeError>> = self
            .tools
            .drain()
            .into_iter()
            .map(|call| Ok(Response::from_tool_calls(vec![call])))
            .collect();

        let reasoning: Vec<&str> = self.reasoning.iter().map(String::as_str).filter(|r| !r.is_empty()).collect();
        let sections = render_sections(self.has_text, &reasoning.join("\n\n"), &[]);
        if !sections.is_empty() {
            out.push(Ok(Response::text(sections)));
        }
        out
    }
}
