//! Mapping between normalized types and provider wire formats
//!
//! Each provider module exposes a request mapper (`build_request`), a
//! response mapper (`parse_response`) and a streaming reconstructor (a state
//! machine fed one decoded frame at a time). The helpers here are shared by
//! all of them.

pub mod anthropic;
pub mod bedrock;
pub mod google;
pub mod ollama;
pub mod openai;

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};
use switchboard_config::SamplingDefaults;

use crate::error::BridgeError;
use crate::types::{
    InvokeOptions, Media, Prompt, ReasoningEffort, ResponseFormat, SearchParameters, ToolCall, ToolChoice,
    ToolDeclaration,
};

/// Media type assumed for images whose type is neither declared nor detectable
///
/// This is a fidelity gap: an undetectable image is sent labelled as JPEG.
pub const FALLBACK_IMAGE_MEDIA_TYPE: &str = "image/jpeg";

/// Media type assumed for other binary content
pub const FALLBACK_BINARY_MEDIA_TYPE: &str = "application/octet-stream";

/// Model facts a mapper needs beyond the call parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTarget {
    /// Model id sent to the provider
    pub model: String,
    /// Output ceiling, used where the provider requires `max_tokens`
    pub max_output_tokens: u32,
    /// Whether the model accepts reasoning controls
    pub reasoning: bool,
}

/// Invocation parameters after applying precedence
///
/// Per-call options win over configured defaults; provider defaults are
/// applied by each mapper only where a value is still absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParams {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub stop_sequences: Option<Vec<String>>,
    pub tools: Vec<ToolDeclaration>,
    pub tool_choice: Option<ToolChoice>,
    pub response_format: Option<ResponseFormat>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub search: Option<SearchParameters>,
}

impl ResolvedParams {
    /// Merge call options over configured defaults
    pub fn resolve(options: &InvokeOptions, defaults: &SamplingDefaults) -> Self {
        Self {
            temperature: options.temperature.or(defaults.temperature),
            top_p: options.top_p.or(defaults.top_p),
            top_k: options.top_k.or(defaults.top_k),
            max_tokens: options.max_tokens.or(defaults.max_tokens),
            frequency_penalty: options.frequency_penalty.or(defaults.frequency_penalty),
            presence_penalty: options.presence_penalty.or(defaults.presence_penalty),
            stop_sequences: options
                .stop_sequences
                .clone()
                .or_else(|| defaults.stop_sequences.clone())
                .filter(|s| !s.is_empty()),
            tools: options.tools.clone(),
            tool_choice: options.tool_choice.clone(),
            response_format: options.response_format.clone(),
            reasoning_effort: options.reasoning_effort,
            search: options.search.clone(),
        }
    }
}

/// Reject prompts a provider cannot accept
pub fn ensure_messages(prompt: &Prompt) -> Result<(), BridgeError> {
    if prompt.turns().next().is_none() {
        return Err(BridgeError::invalid_request(
            "prompt must contain at least one non-system message",
        ));
    }
    Ok(())
}

/// Reject tool declarations whose parameters are not an object schema
pub fn ensure_tool_schemas(tools: &[ToolDeclaration]) -> Result<(), BridgeError> {
    for tool in tools {
        if !tool.parameters.is_object() {
            return Err(BridgeError::invalid_request(format!(
                "parameters of tool `{}` must be a JSON object schema",
                tool.name
            )));
        }
    }
    Ok(())
}

/// Smallest extended-thinking budget Anthropic models accept
const MIN_THINKING_BUDGET: u32 = 1024;

/// Thinking budget that fits under `max_tokens`
///
/// `None` when the output ceiling leaves no room for the minimum budget.
pub fn thinking_budget(effort: ReasoningEffort, max_tokens: u32) -> Option<u32> {
    let budget = effort.budget_tokens().min(max_tokens.saturating_sub(1));
    if budget < MIN_THINKING_BUDGET {
        tracing::debug!(max_tokens, "max_tokens too small for extended thinking");
        return None;
    }
    Some(budget)
}

/// Log an option the provider cannot carry
pub fn omit(provider: &str, field: &str) {
    tracing::debug!(provider, field, "option not supported by provider, omitted");
}

/// Parse serialized tool arguments
///
/// Empty input yields an empty map. Anything that is not a JSON object is
/// preserved under a `_raw` key instead of being discarded.
pub fn parse_arguments(raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::debug!(arguments = raw, "tool arguments are not a JSON object");
            raw_arguments(raw.to_owned())
        }
    }
}

/// Normalize already-decoded tool arguments
pub fn value_to_arguments(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => raw_arguments(other.to_string()),
    }
}

fn raw_arguments(raw: String) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("_raw".to_owned(), Value::String(raw));
    map
}

/// Fresh correlation id for providers that do not supply one
pub fn synthesize_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Serialize tool arguments for providers that expect a JSON string
pub fn arguments_to_string(arguments: &Map<String, Value>) -> String {
    serde_json::to_string(arguments).unwrap_or_else(|_| "{}".to_owned())
}

/// Resolve the media type of binary content
///
/// A declared type wins; otherwise the bytes are sniffed; otherwise
/// `fallback` is used and the guess is logged.
pub fn media_type(media: &Media, fallback: &str) -> String {
    if let Some(declared) = media.media_type.as_deref().filter(|t| !t.is_empty()) {
        return declared.to_owned();
    }
    if let Some(kind) = infer::get(&media.data) {
        return kind.mime_type().to_owned();
    }
    tracing::debug!(fallback, "media type unknown, using fallback");
    fallback.to_owned()
}

/// Base64 (standard alphabet) encoding of raw bytes
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Render auxiliary sections appended after the answer text
///
/// `has_text` says whether answer text precedes the sections, in which case
/// the first section is separated from it by a blank line.
pub fn render_sections(has_text: bool, reasoning: &str, citations: &[String]) -> String {
    let mut out = String::new();
    let mut push = |section: String| {
        if has_text || !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&section);
    };

    if !reasoning.is_empty() {
        push(format!("Reasoning:\n{reasoning}"));
    }
    if !citations.is_empty() {
        let list: Vec<String> = citations.iter().map(|c| format!("- {c}")).collect();
        push(format!("Citations:\n{}", list.join("\n")));
    }

    out
}

/// Accumulates streamed tool-call fragments until each call closes
#[derive(Debug, Default)]
pub struct ToolCallBuffer {
    pending: BTreeMap<u32, PendingCall>,
}

#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl ToolCallBuffer {
    /// Record the id and name of a call, creating it if needed
    pub fn start(&mut self, index: u32, id: Option<String>, name: Option<String>) {
        let call = self.pending.entry(index).or_default();
        if let Some(id) = id.filter(|i| !i.is_empty()) {
            call.id = Some(id);
        }
        if let Some(name) = name {
            call.name.push_str(&name);
        }
    }

    /// Append an argument fragment
    pub fn push_arguments(&mut self, index: u32, fragment: &str) {
        self.pending.entry(index).or_default().arguments.push_str(fragment);
    }

    /// Whether a call is being accumulated at `index`
    pub fn contains(&self, index: u32) -> bool {
        self.pending.contains_key(&index)
    }

    /// Complete the call at `index`
    pub fn finish(&mut self, index: u32) -> Option<ToolCall> {
        self.pending.remove(&index).map(PendingCall::into_tool_call)
    }

    /// Complete every call with an index lower than `index`
    pub fn finish_before(&mut self, index: u32) -> Vec<ToolCall> {
        let later = self.pending.split_off(&index);
        let done = std::mem::replace(&mut self.pending, later);
        done.into_values().map(PendingCall::into_tool_call).collect()
    }

    /// Complete every pending call in index order
    pub fn drain(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.pending)
            .into_values()
            .map(PendingCall::into_tool_call)
            .collect()
    }
}

impl PendingCall {
    fn into_tool_call(self) -> ToolCall {
        ToolCall {
            id: self.id.unwrap_or_else(synthesize_call_id),
            name: self.name,
            arguments: parse_arguments(&self.arguments),
        }
    }
}
