//! Gemini `generateContent` mapping

use serde_json::{Value, json};

use crate::classify::ClassifyContext;
use crate::convert::{
    FALLBACK_BINARY_MEDIA_TYPE, FALLBACK_IMAGE_MEDIA_TYPE, ModelTarget, ResolvedParams, encode_base64,
    ensure_messages, ensure_tool_schemas, media_type, omit, render_sections, synthesize_call_id, value_to_arguments,
};
use crate::error::BridgeError;
use crate::protocol::google::{
    FunctionCall, FunctionCallingConfig, FunctionDeclaration, FunctionResponse, GeminiContent, GeminiTool,
    GenerateRequest, GenerateResponse, GenerationConfig, InlineData, Part, ThinkingConfig, ToolConfig, UsageMetadata,
};
use crate::stream::Reconstructor;
use crate::types::{Content, Message, Prompt, Response, ResponseFormat, Role, ToolCall, ToolChoice, Usage};

const PROVIDER: &str = "google";

/// Candidate finish reasons that mean the output was withheld
const BLOCK_REASONS: [&str; 5] = ["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII", "RECITATION"];

/// Build a `generateContent` request
pub fn build_request(
    prompt: &Prompt,
    params: &ResolvedParams,
    target: &ModelTarget,
) -> Result<GenerateRequest, BridgeError> {
    ensure_messages(prompt)?;
    ensure_tool_schemas(&params.tools)?;

    let mut contents: Vec<GeminiContent> = Vec::new();
    for message in prompt.turns() {
        let (role, parts) = map_message(message);
        if parts.is_empty() {
            tracing::debug!(provider = PROVIDER, "dropping turn with no representable content");
            continue;
        }
        match contents.last_mut() {
            Some(last) if last.role.as_deref() == Some(role) => last.parts.extend(parts),
            _ => contents.push(GeminiContent {
                role: Some(role.to_owned()),
                parts,
            }),
        }
    }

    let system_instruction = prompt.system_text().map(|text| GeminiContent {
        role: None,
        parts: vec![Part::text(text)],
    });

    let (response_mime_type, response_schema) = match &params.response_format {
        Some(ResponseFormat::JsonObject) => (Some("application/json"), None),
        Some(ResponseFormat::JsonSchema { schema, .. }) => (Some("application/json"), Some(schema.clone())),
        Some(ResponseFormat::Text) | None => (None, None),
    };

    let thinking_config = params.reasoning_effort.and_then(|effort| {
        if target.reasoning {
            Some(ThinkingConfig {
                thinking_budget: effort.budget_tokens(),
                include_thoughts: true,
            })
        } else {
            omit(PROVIDER, "reasoning_effort");
            None
        }
    });

    if params.search.is_some() {
        omit(PROVIDER, "search");
    }

    let generation_config = GenerationConfig {
        temperature: params.temperature,
        top_p: params.top_p,
        top_k: params.top_k,
        max_output_tokens: params.max_tokens,
        stop_sequences: params.stop_sequences.clone(),
        frequency_penalty: params.frequency_penalty,
        presence_penalty: params.presence_penalty,
        response_mime_type,
        response_schema,
        thinking_config,
    };

    let (tools, tool_config) = if params.tools.is_empty() {
        (None, None)
    } else {
        let declarations = params
            .tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect();
        let config = params.tool_choice.as_ref().map(|choice| {
            let (mode, allowed_function_names) = match choice {
                ToolChoice::Auto => ("AUTO", None),
                ToolChoice::None => ("NONE", None),
                ToolChoice::Required => ("ANY", None),
                ToolChoice::Tool(name) => ("ANY", Some(vec![name.clone()])),
            };
            ToolConfig {
                function_calling_config: FunctionCallingConfig {
                    mode,
                    allowed_function_names,
                },
            }
        });
        (
            Some(vec![GeminiTool {
                function_declarations: declarations,
            }]),
            config,
        )
    };

    Ok(GenerateRequest {
        contents,
        system_instruction,
        generation_config: (!generation_config.is_empty()).then_some(generation_config),
        tools,
        tool_config,
    })
}

fn map_message(message: &Message) -> (&'static str, Vec<Part>) {
    if message.role == Role::Tool
        && let Some(result) = &message.tool_result
    {
        let part = Part {
            function_response: Some(FunctionResponse {
                id: Some(result.tool_call_id.clone()),
                name: result.name.clone(),
                response: tool_output(message.text()),
            }),
            ..Part::default()
        };
        return ("user", vec![part]);
    }

    let role = if message.role == Role::Assistant { "model" } else { "user" };

    let mut parts: Vec<Part> = message.content.iter().filter_map(map_content).collect();
    parts.extend(message.tool_calls.iter().map(|call| Part {
        function_call: Some(FunctionCall {
            id: Some(call.id.clone()),
            name: call.name.clone(),
            args: Value::Object(call.arguments.clone()),
        }),
        ..Part::default()
    }));

    (role, parts)
}

/// `functionResponse.response` must be an object
fn tool_output(text: String) -> Value {
    match serde_json::from_str::<Value>(&text) {
        Ok(value @ Value::Object(_)) => value,
        _ => json!({ "content": text }),
    }
}

fn map_content(content: &Content) -> Option<Part> {
    let (media, fallback) = match content {
        Content::Text(text) if text.is_empty() => return None,
        Content::Text(text) => return Some(Part::text(text.clone())),
        Content::Image(media) => (media, FALLBACK_IMAGE_MEDIA_TYPE),
        Content::Audio(media) | Content::Video(media) | Content::File(media) => (media, FALLBACK_BINARY_MEDIA_TYPE),
    };
    Some(Part {
        inline_data: Some(InlineData {
            mime_type: media_type(media, fallback),
            data: encode_base64(&media.data),
        }),
        ..Part::default()
    })
}

/// Reason the response was withheld, if it was
fn block_reason(response: &GenerateResponse, has_output: bool) -> Option<String> {
    if let Some(reason) = response.prompt_feedback.as_ref().and_then(|f| f.block_reason.clone()) {
        return Some(reason);
    }
    if has_output {
        return None;
    }
    response
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref())
        .filter(|reason| BLOCK_REASONS.contains(reason))
        .map(str::to_owned)
}

fn blocked(reason: &str) -> BridgeError {
    tracing::warn!(provider = PROVIDER, reason, "response blocked by safety system");
    BridgeError::blocked(format!("response blocked: {reason}"))
}

const fn usage(metadata: UsageMetadata) -> Usage {
    Usage::new(
        metadata.prompt_token_count,
        metadata
            .candidates_token_count
            .saturating_add(metadata.thoughts_token_count),
    )
}

/// Answer text, reasoning text and tool calls of the first candidate
fn split_parts(response: &mut GenerateResponse) -> (String, String, Vec<ToolCall>) {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls = Vec::new();

    let parts = response
        .candidates
        .first_mut()
        .and_then(|c| c.content.take())
        .map(|c| c.parts)
        .unwrap_or_default();

    for part in parts {
        if let Some(call) = part.function_call {
            let id = call.id.filter(|id| !id.is_empty()).unwrap_or_else(synthesize_call_id);
            tool_calls.push(ToolCall::new(id, call.name, value_to_arguments(call.args)));
        } else if let Some(t) = part.text {
            if part.thought {
                reasoning.push_str(&t);
            } else {
                text.push_str(&t);
            }
        }
    }

    (text, reasoning, tool_calls)
}

/// Map a complete `generateContent` response
pub fn parse_response(mut response: GenerateResponse) -> Result<Response, BridgeError> {
    let (mut text, reasoning, tool_calls) = split_parts(&mut response);

    if let Some(reason) = block_reason(&response, !text.is_empty() || !tool_calls.is_empty()) {
        return Err(blocked(&reason));
    }

    let sections = render_sections(!text.is_empty(), &reasoning, &[]);
    text.push_str(&sections);

    Ok(Response {
        content: Content::Text(text),
        usage: response.usage_metadata.map(usage),
        tool_calls,
    })
}

/// Streaming reconstructor for `streamGenerateContent?alt=sse` events
///
/// Gemini repeats cumulative usage on every event, so only the last report
/// is emitted, once the stream ends.
pub struct GeminiStream {
    ctx: ClassifyContext,
    reasoning: String,
    has_output: bool,
    has_text: bool,
    usage: Option<Usage>,
}

impl GeminiStream {
    /// Fresh state for one stream
    pub const fn new(ctx: ClassifyContext) -> Self {
        Self {
            ctx,
            reasoning: String::new(),
            has_output: false,
            has_text: false,
            usage: None,
        }
    }
}

impl Reconstructor for GeminiStream {
    type Frame = GenerateResponse;

    fn on_frame(&mut self, mut frame: GenerateResponse) -> Vec<Result<Response, BridgeError>> {
        let (text, reasoning, tool_calls) = split_parts(&mut frame);
        self.reasoning.push_str(&reasoning);

        let mut out = Vec::new();
        if !text.is_empty() {
            self.has_text = true;
            out.push(Ok(Response::text(text)));
        }
        out.extend(tool_calls.into_iter().map(|call| Ok(Response::from_tool_calls(vec![call]))));
        self.has_output |= !out.is_empty();

        if let Some(reason) = block_reason(&frame, self.has_output) {
            tracing::debug!(provider = %self.ctx.provider, model = %self.ctx.model, "stream blocked");
            out.push(Err(blocked(&reason)));
            return out;
        }

        if let Some(metadata) = frame.usage_metadata {
            self.usage = Some(usage(metadata));
        }
        out
    }

    fn finish(&mut self) -> Vec<Result<Response, BridgeError>> {
        let mut out = Vec::new();
        let sections = render_sections(self.has_text, &self.reasoning, &[]);
        if !sections.is_empty() {
            out.push(Ok(Response::text(sections)));
        }
        if let Some(usage) = self.usage.take() {
            out.push(Ok(Response::from_usage(usage)));
        }
        out
    }
}
