//! Bedrock Converse mapping
//!
//! Requests are built from the SDK's own types. Stream events are first
//! flattened into [`ConverseFrame`]s so the reconstructor does not depend on
//! SDK builders.

use std::collections::HashMap;

use aws_sdk_bedrockruntime::types::{
    AnyToolChoice, AutoToolChoice, ContentBlock, ContentBlockDelta, ContentBlockStart, ConversationRole,
    ConverseStreamOutput, DocumentBlock, DocumentFormat, DocumentSource, ImageBlock, ImageFormat, ImageSource,
    InferenceConfiguration, Message as BedrockMessage, ReasoningContentBlock, ReasoningContentBlockDelta,
    SpecificToolChoice, StopReason, SystemContentBlock, TokenUsage, Tool, ToolChoice as BedrockToolChoice,
    ToolConfiguration, ToolInputSchema, ToolResultBlock, ToolResultContentBlock, ToolSpecification, ToolUseBlock,
};
use aws_smithy_types::{Blob, Document, Number};
use serde_json::{Map, Value};

use crate::convert::{
    FALLBACK_IMAGE_MEDIA_TYPE, ModelTarget, ResolvedParams, ToolCallBuffer, ensure_messages, ensure_tool_schemas,
    media_type, omit, render_sections, thinking_budget, value_to_arguments,
};
use crate::error::BridgeError;
use crate::stream::Reconstructor;
use crate::types::{Content, Message, Prompt, Response, Role, ToolCall, ToolChoice, Usage};

const PROVIDER: &str = "bedrock";

/// Everything a Converse / `ConverseStream` call needs
#[derive(Debug, Clone)]
pub struct ConverseInput {
    pub model_id: String,
    pub system: Option<Vec<SystemContentBlock>>,
    pub messages: Vec<BedrockMessage>,
    pub inference_config: Option<InferenceConfiguration>,
    pub tool_config: Option<ToolConfiguration>,
    /// Model-specific fields (`top_k`, `thinking`) for Anthropic models
    pub additional_fields: Option<Document>,
}

/// Build Converse input
pub fn build_request(prompt: &Prompt, params: &ResolvedParams, target: &ModelTarget) -> Result<ConverseInput, BridgeError> {
    ensure_messages(prompt)?;
    ensure_tool_schemas(&params.tools)?;

    let mut turns: Vec<(ConversationRole, Vec<ContentBlock>)> = Vec::new();
    for message in prompt.turns() {
        let (role, blocks) = map_message(message)?;
        if blocks.is_empty() {
            tracing::debug!(provider = PROVIDER, "dropping turn with no representable content");
            continue;
        }
        match turns.last_mut() {
            Some((last, content)) if *last == role => content.extend(blocks),
            _ => turns.push((role, blocks)),
        }
    }
    let messages = turns
        .into_iter()
        .map(|(role, content)| {
            BedrockMessage::builder()
                .role(role)
                .set_content(Some(content))
                .build()
                .map_err(invalid)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let anthropic_model = is_anthropic(&target.model);
    let mut additional = Map::new();

    let thinking = params.reasoning_effort.and_then(|effort| {
        if target.reasoning && anthropic_model {
            thinking_budget(effort, params.max_tokens.unwrap_or(target.max_output_tokens))
        } else {
            omit(PROVIDER, "reasoning_effort");
            None
        }
    });
    if let Some(budget) = thinking {
        additional.insert(
            "thinking".to_owned(),
            serde_json::json!({"type": "enabled", "budget_tokens": budget}),
        );
    }

    match params.top_k {
        Some(top_k) if anthropic_model && thinking.is_none() => {
            additional.insert("top_k".to_owned(), Value::from(top_k));
        }
        Some(_) => omit(PROVIDER, "top_k"),
        None => {}
    }
    for (field, set) in [
        ("frequency_penalty", params.frequency_penalty.is_some()),
        ("presence_penalty", params.presence_penalty.is_some()),
        ("response_format", params.response_format.is_some()),
        ("search", params.search.is_some()),
    ] {
        if set {
            omit(PROVIDER, field);
        }
    }

    let max_tokens = if thinking.is_some() {
        Some(params.max_tokens.unwrap_or(target.max_output_tokens))
    } else {
        params.max_tokens
    };
    let temperature = if thinking.is_some() { None } else { params.temperature };

    Ok(ConverseInput {
        model_id: target.model.clone(),
        system: prompt.system_text().map(|text| vec![SystemContentBlock::Text(text)]),
        messages,
        inference_config: inference_config(temperature, params.top_p, max_tokens, params.stop_sequences.clone()),
        tool_config: tool_config(params)?,
        additional_fields: (!additional.is_empty()).then(|| value_to_document(&Value::Object(additional))),
    })
}

/// Whether the model id names an Anthropic model, with or without a region prefix
fn is_anthropic(model: &str) -> bool {
    model.starts_with("anthropic.") || model.split_once('.').is_some_and(|(_, rest)| rest.starts_with("anthropic."))
}

fn invalid(error: impl std::fmt::Display) -> BridgeError {
    BridgeError::invalid_request(format!("invalid bedrock request: {error}"))
}

#[allow(clippy::cast_possible_truncation)]
fn inference_config(
    temperature: Option<f64>,
    top_p: Option<f64>,
    max_tokens: Option<u32>,
    stop_sequences: Option<Vec<String>>,
) -> Option<InferenceConfiguration> {
    if temperature.is_none() && top_p.is_none() && max_tokens.is_none() && stop_sequences.is_none() {
        return None;
    }
    Some(
        InferenceConfiguration::builder()
            .set_temperature(temperature.map(|t| t as f32))
            .set_top_p(top_p.map(|p| p as f32))
            .set_max_tokens(max_tokens.map(|m| i32::try_from(m).unwrap_or(i32::MAX)))
            .set_stop_sequences(stop_sequences)
            .build(),
    )
}

fn tool_config(params: &ResolvedParams) -> Result<Option<ToolConfiguration>, BridgeError> {
    if params.tools.is_empty() {
        return Ok(None);
    }

    let tools = params
        .tools
        .iter()
        .map(|t| {
            ToolSpecification::builder()
                .name(&t.name)
                .set_description((!t.description.is_empty()).then(|| t.description.clone()))
                .input_schema(ToolInputSchema::Json(value_to_document(&t.parameters)))
                .build()
                .map(Tool::ToolSpec)
                .map_err(invalid)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let choice = match &params.tool_choice {
        Some(ToolChoice::Auto) => Some(BedrockToolChoice::Auto(AutoToolChoice::builder().build())),
        Some(ToolChoice::Required) => Some(BedrockToolChoice::Any(AnyToolChoice::builder().build())),
        Some(ToolChoice::Tool(name)) => Some(BedrockToolChoice::Tool(
            SpecificToolChoice::builder().name(name).build().map_err(invalid)?,
        )),
        Some(ToolChoice::None) => {
            omit(PROVIDER, "tool_choice");
            None
        }
        None => None,
    };

    ToolConfiguration::builder()
        .set_tools(Some(tools))
        .set_tool_choice(choice)
        .build()
        .map(Some)
        .map_err(invalid)
}

fn map_message(message: &Message) -> Result<(ConversationRole, Vec<ContentBlock>), BridgeError> {
    if message.role == Role::Tool
        && let Some(result) = &message.tool_result
    {
        let block = ToolResultBlock::builder()
            .tool_use_id(&result.tool_call_id)
            .content(ToolResultContentBlock::Text(message.text()))
            .build()
            .map_err(invalid)?;
        return Ok((ConversationRole::User, vec![ContentBlock::ToolResult(block)]));
    }

    let role = if message.role == Role::Assistant {
        ConversationRole::Assistant
    } else {
        ConversationRole::User
    };

    let mut blocks = Vec::new();
    for content in &message.content {
        if let Some(block) = map_content(content)? {
            blocks.push(block);
        }
    }
    for call in &message.tool_calls {
        let block = ToolUseBlock::builder()
            .tool_use_id(&call.id)
            .name(&call.name)
            .input(value_to_document(&Value::Object(call.arguments.clone())))
            .build()
            .map_err(invalid)?;
        blocks.push(ContentBlock::ToolUse(block));
    }

    Ok((role, blocks))
}

fn map_content(content: &Content) -> Result<Option<ContentBlock>, BridgeError> {
    let block = match content {
        Content::Text(text) if text.is_empty() => None,
        Content::Text(text) => Some(ContentBlock::Text(text.clone())),
        Content::Image(media) => {
            let format = match media_type(media, FALLBACK_IMAGE_MEDIA_TYPE).as_str() {
                "image/png" => ImageFormat::Png,
                "image/gif" => ImageFormat::Gif,
                "image/webp" => ImageFormat::Webp,
                _ => ImageFormat::Jpeg,
            };
            let image = ImageBlock::builder()
                .format(format)
                .source(ImageSource::Bytes(Blob::new(media.data.clone())))
                .build()
                .map_err(invalid)?;
            Some(ContentBlock::Image(image))
        }
        Content::File(media) if media_type(media, "").as_str() == "application/pdf" => {
            let document = DocumentBlock::builder()
                .format(DocumentFormat::Pdf)
                .name("document")
                .source(DocumentSource::Bytes(Blob::new(media.data.clone())))
                .build()
                .map_err(invalid)?;
            Some(ContentBlock::Document(document))
        }
        Content::Audio(_) | Content::Video(_) | Content::File(_) => {
            tracing::debug!(provider = PROVIDER, kind = content.kind(), "content not supported, dropped");
            None
        }
    };
    Ok(block)
}

/// Whether a stop reason means the output was withheld
fn is_block(reason: &StopReason) -> bool {
    matches!(reason, StopReason::ContentFiltered | StopReason::GuardrailIntervened)
}

fn blocked(reason: &StopReason) -> BridgeError {
    tracing::warn!(provider = PROVIDER, reason = reason.as_str(), "response blocked by safety system");
    BridgeError::blocked(format!("response blocked: {}", reason.as_str()))
}

/// Normalize SDK token counts
pub fn usage(usage: &TokenUsage) -> Usage {
    Usage::new(
        u32::try_from(usage.input_tokens()).unwrap_or_default(),
        u32::try_from(usage.output_tokens()).unwrap_or_default(),
    )
}

/// Map the content of a Converse reply
pub fn parse_response(blocks: &[ContentBlock], stop_reason: &StopReason, usage: Option<Usage>) -> Result<Response, BridgeError> {
    if is_block(stop_reason) {
        return Err(blocked(stop_reason));
    }

    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text(t) => text.push_str(t),
            ContentBlock::ToolUse(tool_use) => tool_calls.push(ToolCall::new(
                tool_use.tool_use_id(),
                tool_use.name(),
                value_to_arguments(document_to_value(tool_use.input())),
            )),
            ContentBlock::ReasoningContent(ReasoningContentBlock::ReasoningText(r)) => reasoning.push_str(r.text()),
            _ => {}
        }
    }

    let sections = render_sections(!text.is_empty(), &reasoning, &[]);
    text.push_str(&sections);

    Ok(Response {
        content: Content::Text(text),
        usage,
        tool_calls,
    })
}

/// One `ConverseStream` event, reduced to what reconstruction needs
#[derive(Debug, Clone, PartialEq)]
pub enum ConverseFrame {
    Text(String),
    Reasoning(String),
    ToolStart { index: u32, id: String, name: String },
    ToolInput { index: u32, fragment: String },
    BlockStop { index: u32 },
    Stop { blocked: bool, reason: String },
    Usage(Usage),
}

/// Flatten an SDK stream event; events without content yield `None`
pub fn frame(event: ConverseStreamOutput) -> Option<ConverseFrame> {
    let index = |i: i32| u32::try_from(i).unwrap_or_default();
    match event {
        ConverseStreamOutput::ContentBlockStart(start) => match start.start() {
            Some(ContentBlockStart::ToolUse(tool)) => Some(ConverseFrame::ToolStart {
                index: index(start.content_block_index()),
                id: tool.tool_use_id().to_owned(),
                name: tool.name().to_owned(),
            }),
            _ => None,
        },
        ConverseStreamOutput::ContentBlockDelta(delta) => match delta.delta() {
            Some(ContentBlockDelta::Text(text)) => Some(ConverseFrame::Text(text.clone())),
            Some(ContentBlockDelta::ToolUse(tool)) => Some(ConverseFrame::ToolInput {
                index: index(delta.content_block_index()),
                fragment: tool.input().to_owned(),
            }),
            Some(ContentBlockDelta::ReasoningContent(ReasoningContentBlockDelta::Text(text))) => {
                Some(ConverseFrame::Reasoning(text.clone()))
            }
            _ => None,
        },
        ConverseStreamOutput::ContentBlockStop(stop) => Some(ConverseFrame::BlockStop {
            index: index(stop.content_block_index()),
        }),
        ConverseStreamOutput::MessageStop(stop) => Some(ConverseFrame::Stop {
            blocked: is_block(stop.stop_reason()),
            reason: stop.stop_reason().as_str().to_owned(),
        }),
        ConverseStreamOutput::Metadata(metadata) => metadata.usage().map(|u| ConverseFrame::Usage(usage(u))),
        _ => None,
    }
}

/// Streaming reconstructor for `ConverseStream`
#[derive(Debug, Default)]
pub struct ConverseStream {
    tools: ToolCallBuffer,
    reasoning: String,
    has_text: bool,
}

impl Reconstructor for ConverseStream {
    type Frame = ConverseFrame;

    fn on_frame(&mut self, frame: ConverseFrame) -> Vec<Result<Response, BridgeError>> {
        match frame {
            ConverseFrame::Text(text) => {
                self.has_text |= !text.is_empty();
                vec![Ok(Response::text(text))]
            }
            ConverseFrame::Reasoning(text) => {
                self.reasoning.push_str(&text);
                Vec::new()
            }
            ConverseFrame::ToolStart { index, id, name } => {
                self.tools.start(index, Some(id), Some(name));
                Vec::new()
            }
            ConverseFrame::ToolInput { index, fragment } => {
                self.tools.push_arguments(index, &fragment);
                Vec::new()
            }
            ConverseFrame::BlockStop { index } => self
                .tools
                .finish(index)
                .map(|call| vec![Ok(Response::from_tool_calls(vec![call]))])
                .unwrap_or_default(),
            ConverseFrame::Stop { blocked, reason } => {
                if blocked {
                    tracing::warn!(provider = PROVIDER, reason = %reason, "stream blocked by safety system");
                    vec![Err(BridgeError::blocked(format!("response blocked: {reason}")))]
                } else {
                    Vec::new()
                }
            }
            ConverseFrame::Usage(usage) => vec![Ok(Response::from_usage(usage))],
        }
    }

    fn finish(&mut self) -> Vec<Result<Response, BridgeError>> {
        let mut out: Vec<Result<Response, BridgeError>> = self
            .tools
            .drain()
            .into_iter()
            .map(|call| Ok(Response::from_tool_calls(vec![call])))
            .collect();
        let sections = render_sections(self.has_text, &self.reasoning, &[]);
        if !sections.is_empty() {
            out.push(Ok(Response::text(sections)));
        }
        out
    }
}

/// Convert a JSON value into a Smithy document
pub fn value_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else {
                n.as_f64().map_or(Document::Null, |f| Document::Number(Number::Float(f)))
            }
        }
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(value_to_document).collect()),
        Value::Object(map) => Document::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_document(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

/// Convert a Smithy document into a JSON value
pub fn document_to_value(document: &Document) -> Value {
    match document {
        Document::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), document_to_value(v))).collect()),
        Document::Array(items) => Value::Array(items.iter().map(document_to_value).collect()),
        Document::Number(Number::PosInt(u)) => Value::from(*u),
        Document::Number(Number::NegInt(i)) => Value::from(*i),
        Document::Number(Number::Float(f)) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Document::String(s) => Value::String(s.clone()),
        Document::Bool(b) => Value::Bool(*b),
        Document::Null => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{StreamExt, stream};
    use serde_json::json;
    use switchboard_config::SamplingDefaults;

    use super::*;
    use crate::types::{InvokeOptions, ReasoningEffort, ToolDeclaration};

    fn target(model: &str) -> ModelTarget {
        ModelTarget {
            model: model.to_owned(),
            max_output_tokens: 8192,
            reasoning: true,
        }
    }

    fn build(prompt: &Prompt, options: &InvokeOptions, model: &str) -> ConverseInput {
        let params = ResolvedParams::resolve(options, &SamplingDefaults::default());
        build_request(prompt, &params, &target(model)).unwrap()
    }

    #[test]
    fn system_is_hoisted_and_tool_results_join_user_turn() {
        let call = ToolCall::new("call-1", "weather", Map::new());
        let prompt = Prompt::new(vec![
            Message::system("Be terse."),
            Message::user("Weather?"),
            Message::new(Role::Assistant, Vec::new()).with_tool_calls(vec![call]),
            Message::tool("weather", "call-1", "{\"ok\":true}"),
            Message::user("Summarize."),
        ]);
        let input = build(&prompt, &InvokeOptions::default(), "amazon.nova-pro-v1:0");

        assert_eq!(input.system, Some(vec![SystemContentBlock::Text("Be terse.".to_owned())]));
        assert_eq!(input.messages.len(), 3);
        assert_eq!(input.messages[1].role(), &ConversationRole::Assistant);
        assert!(matches!(&input.messages[1].content()[0], ContentBlock::ToolUse(t) if t.tool_use_id() == "call-1"));

        let user = input.messages[2].content();
        assert!(matches!(&user[0], ContentBlock::ToolResult(r) if r.tool_use_id() == "call-1"));
        assert_eq!(user[1], ContentBlock::Text("Summarize.".to_owned()));
        assert!(input.inference_config.is_none());
        assert!(input.tool_config.is_none());
    }

    #[test]
    fn inference_and_additional_fields() {
        let options = InvokeOptions {
            temperature: Some(0.5),
            max_tokens: Some(300),
            top_k: Some(50),
            stop_sequences: Some(vec!["END".to_owned()]),
            ..InvokeOptions::default()
        };
        let input = build(&Prompt::user("hi"), &options, "us.anthropic.claude-3-haiku-20240307-v1:0");

        let config = input.inference_config.unwrap();
        assert_eq!(config.temperature(), Some(0.5));
        assert_eq!(config.max_tokens(), Some(300));
        assert_eq!(config.stop_sequences().to_vec(), vec!["END".to_owned()]);
        assert_eq!(document_to_value(&input.additional_fields.unwrap()), json!({"top_k": 50}));

        let input = build(&Prompt::user("hi"), &options, "amazon.nova-lite-v1:0");
        assert!(input.additional_fields.is_none());
    }

    #[test]
    fn reasoning_effort_requests_thinking() {
        let options = InvokeOptions {
            reasoning_effort: Some(ReasoningEffort::Medium),
            temperature: Some(0.5),
            ..InvokeOptions::default()
        };
        let input = build(&Prompt::user("hi"), &options, "anthropic.claude-sonnet-4-20250514-v1:0");

        assert_eq!(
            document_to_value(&input.additional_fields.unwrap()),
            json!({"thinking": {"type": "enabled", "budget_tokens": 4096}})
        );
        let config = input.inference_config.unwrap();
        assert_eq!(config.temperature(), None);
        assert_eq!(config.max_tokens(), Some(8192));
    }

    #[test]
    fn tools_are_declared() {
        let options = InvokeOptions {
            tools: vec![ToolDeclaration::new("lookup", "Find it", json!({"type": "object"}))],
            tool_choice: Some(ToolChoice::Required),
            ..InvokeOptions::default()
        };
        let input = build(&Prompt::user("hi"), &options, "amazon.nova-pro-v1:0");
        let config = input.tool_config.unwrap();

        assert_eq!(config.tools().len(), 1);
        assert!(matches!(config.tool_choice(), Some(BedrockToolChoice::Any(_))));
    }

    #[test]
    fn documents_round_trip_numbers() {
        let value = json!({"int": 3, "neg": -2, "float": 1.5, "list": [true, null, "s"]});
        assert_eq!(document_to_value(&value_to_document(&value)), value);
    }

    #[test]
    fn parses_text_and_tool_use() {
        let tool_use = ToolUseBlock::builder()
            .tool_use_id("tooluse_1")
            .name("lookup")
            .input(value_to_document(&json!({"q": "rust"})))
            .build()
            .unwrap();
        let blocks = vec![ContentBlock::Text("Hi there".to_owned()), ContentBlock::ToolUse(tool_use)];

        let parsed = parse_response(&blocks, &StopReason::ToolUse, Some(Usage::new(10, 5))).unwrap();
        assert_eq!(parsed.text_content(), "Hi there");
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
        assert_eq!(parsed.tool_calls[0].id, "tooluse_1");
        assert_eq!(parsed.tool_calls[0].arguments["q"], "rust");
    }

    #[test]
    fn guardrail_is_a_failure() {
        let err = parse_response(&[], &StopReason::GuardrailIntervened, None).unwrap_err();
        assert!(err.is_blocked());
        assert!(parse_response(&[], &StopReason::ContentFiltered, None).is_err());
    }

    #[tokio::test]
    async fn stream_reassembles_text_tools_and_usage() {
        let frames = vec![
            ConverseFrame::Text("Hel".to_owned()),
            ConverseFrame::Text("lo".to_owned()),
            ConverseFrame::BlockStop { index: 0 },
            ConverseFrame::ToolStart {
                index: 1,
                id: "tooluse_1".to_owned(),
                name: "lookup".to_owned(),
            },
            ConverseFrame::ToolInput {
                index: 1,
                fragment: "{\"q\":".to_owned(),
            },
            ConverseFrame::ToolInput {
                index: 1,
                fragment: "\"rust\"}".to_owned(),
            },
            ConverseFrame::BlockStop { index: 1 },
            ConverseFrame::Stop {
                blocked: false,
                reason: "tool_use".to_owned(),
            },
            ConverseFrame::Usage(Usage::new(7, 3)),
        ];

        let items: Vec<Response> = crate::stream::reconstruct(stream::iter(frames.into_iter().map(Ok)), ConverseStream::default())
            .map(Result::unwrap)
            .collect()
            .await;

        assert_eq!(items.len(), 4);
        assert_eq!(items[0], Response::text("Hel"));
        assert_eq!(items[1], Response::text("lo"));
        assert_eq!(items[2].tool_calls[0].arguments["q"], "rust");
        assert_eq!(items[3], Response::from_usage(Usage::new(7, 3)));
    }

    #[tokio::test]
    async fn stream_guardrail_ends_with_error() {
        let frames = vec![
            Ok(ConverseFrame::Stop {
                blocked: true,
                reason: "guardrail_intervened".to_owned(),
            }),
            Ok(ConverseFrame::Usage(Usage::new(1, 0))),
        ];
        let items: Vec<_> = crate::stream::reconstruct(stream::iter(frames), ConverseStream::default())
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().is_blocked());
    }
}
