//! Static catalog of well-known models
//!
//! Used for metadata, provider defaults (Anthropic's required `max_tokens`),
//! feature-flag support and strict model validation. Nothing here touches
//! the network.

use serde::Serialize;

use crate::provider::ProviderKind;
use crate::types::Usage;

/// Context window assumed for models missing from the catalog
pub const DEFAULT_CONTEXT_WINDOW: u32 = 128_000;

/// Output limit assumed for models missing from the catalog
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Price per million tokens, in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pricing {
    /// Prompt tokens
    pub input_per_mtok: f64,
    /// Generated tokens
    pub output_per_mtok: f64,
}

impl Pricing {
    /// Estimated USD cost of a call
    pub fn estimate_cost(&self, usage: &Usage) -> f64 {
        (f64::from(usage.prompt_tokens) * self.input_per_mtok
            + f64::from(usage.completion_tokens) * self.output_per_mtok)
            / 1_000_000.0
    }
}

/// Static facts about one model
#[derive(Debug, Clone, Copy)]
pub struct ModelInfo {
    /// Model id as sent to the provider
    pub id: &'static str,
    /// Context window in tokens
    pub context_window: u32,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// Published pricing, if any
    pub pricing: Option<Pricing>,
    /// Accepts image input
    pub vision: bool,
    /// Produces reasoning output
    pub reasoning: bool,
    /// Supports the extended (1M token) context beta
    pub extended_context: bool,
    /// Supports the extended (128k token) output beta
    pub extended_output: bool,
}

const fn model(
    id: &'static str,
    context_window: u32,
    max_output_tokens: u32,
    pricing: (f64, f64),
    vision: bool,
    reasoning: bool,
) -> ModelInfo {
    ModelInfo {
        id,
        context_window,
        max_output_tokens,
        pricing: Some(Pricing {
            input_per_mtok: pricing.0,
            output_per_mtok: pricing.1,
        }),
        vision,
        reasoning,
        extended_context: false,
        extended_output: false,
    }
}

const fn local(id: &'static str, context_window: u32, vision: bool, reasoning: bool) -> ModelInfo {
    ModelInfo {
        id,
        context_window,
        max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        pricing: None,
        vision,
        reasoning,
        extended_context: false,
        extended_output: false,
    }
}

const ANTHROPIC: &[ModelInfo] = &[
    model("claude-opus-4-1-20250805", 200_000, 32_000, (15.0, 75.0), true, true),
    model("claude-opus-4-20250514", 200_000, 32_000, (15.0, 75.0), true, true),
    ModelInfo {
        extended_context: true,
        ..model("claude-sonnet-4-20250514", 200_000, 64_000, (3.0, 15.0), true, true)
    },
    ModelInfo {
        extended_output: true,
        ..model("claude-3-7-sonnet-20250219", 200_000, 64_000, (3.0, 15.0), true, true)
    },
    model("claude-3-5-sonnet-20241022", 200_000, 8192, (3.0, 15.0), true, false),
    model("claude-3-5-haiku-20241022", 200_000, 8192, (0.8, 4.0), true, false),
    model("claude-3-haiku-20240307", 200_000, 4096, (0.25, 1.25), true, false),
];

const OPENAI: &[ModelInfo] = &[
    model("gpt-4o", 128_000, 16_384, (2.5, 10.0), true, false),
    model("gpt-4o-mini", 128_000, 16_384, (0.15, 0.6), true, false),
    model("gpt-4.1", 1_047_576, 32_768, (2.0, 8.0), true, false),
    model("gpt-4.1-mini", 1_047_576, 32_768, (0.4, 1.6), true, false),
    model("gpt-4.1-nano", 1_047_576, 32_768, (0.1, 0.4), true, false),
    model("o1", 200_000, 100_000, (15.0, 60.0), true, true),
    model("o3", 200_000, 100_000, (2.0, 8.0), true, true),
    model("o3-mini", 200_000, 100_000, (1.1, 4.4), false, true),
    model("o4-mini", 200_000, 100_000, (1.1, 4.4), true, true),
];

const GOOGLE: &[ModelInfo] = &[
    model("gemini-2.5-pro", 1_048_576, 65_536, (1.25, 10.0), true, true),
    model("gemini-2.5-flash", 1_048_576, 65_536, (0.3, 2.5), true, true),
    model("gemini-2.0-flash", 1_048_576, 8192, (0.1, 0.4), true, false),
    model("gemini-1.5-pro", 2_097_152, 8192, (1.25, 5.0), true, false),
    model("gemini-1.5-flash", 1_048_576, 8192, (0.075, 0.3), true, false),
];

const BEDROCK: &[ModelInfo] = &[
    model("anthropic.claude-sonnet-4-20250514-v1:0", 200_000, 64_000, (3.0, 15.0), true, true),
    model("anthropic.claude-3-5-sonnet-20241022-v2:0", 200_000, 8192, (3.0, 15.0), true, false),
    model("anthropic.claude-3-haiku-20240307-v1:0", 200_000, 4096, (0.25, 1.25), true, false),
    model("amazon.nova-pro-v1:0", 300_000, 5120, (0.8, 3.2), true, false),
    model("amazon.nova-lite-v1:0", 300_000, 5120, (0.06, 0.24), true, false),
    model("meta.llama3-1-70b-instruct-v1:0", 128_000, 2048, (0.72, 0.72), false, false),
    model("mistral.mistral-large-2407-v1:0", 128_000, 8192, (2.0, 6.0), false, false),
];

const OLLAMA: &[ModelInfo] = &[
    local("llama3.2", 131_072, false, false),
    local("llama3.1", 131_072, false, false),
    local("llava", 4096, true, false),
    local("gemma3", 131_072, true, false),
    local("qwen2.5", 32_768, false, false),
    local("mistral", 32_768, false, false),
    local("deepseek-r1", 131_072, false, true),
    local("qwq", 131_072, false, true),
];

const XAI: &[ModelInfo] = &[
    model("grok-4", 256_000, 32_768, (3.0, 15.0), true, true),
    model("grok-3", 131_072, 16_384, (3.0, 15.0), false, false),
    model("grok-3-mini", 131_072, 16_384, (0.3, 0.5), false, true),
    model("grok-2-vision-1212", 32_768, 8192, (2.0, 10.0), true, false),
];

/// Every catalog entry for a provider family
pub const fn models(kind: ProviderKind) -> &'static [ModelInfo] {
    match kind {
        ProviderKind::Anthropic => ANTHROPIC,
        ProviderKind::OpenAi => OPENAI,
        ProviderKind::Google => GOOGLE,
        ProviderKind::Bedrock => BEDROCK,
        ProviderKind::Ollama => OLLAMA,
        ProviderKind::Xai => XAI,
        ProviderKind::OpenAiCompatible => &[],
    }
}

/// Catalog ids for a provider family
pub fn model_ids(kind: ProviderKind) -> Vec<String> {
    models(kind).iter().map(|m| m.id.to_owned()).collect()
}

/// Strip a Bedrock cross-region inference profile prefix
fn canonical_id(kind: ProviderKind, model: &str) -> &str {
    if kind == ProviderKind::Bedrock {
        for region in ["us.", "eu.", "apac."] {
            if let Some(rest) = model.strip_prefix(region) {
                return rest;
            }
        }
    }
    model
}

/// Exact catalog entry for a model id
pub fn find_exact(kind: ProviderKind, model: &str) -> Option<&'static ModelInfo> {
    let id = canonical_id(kind, model);
    models(kind).iter().find(|m| m.id == id)
}

/// Catalog entry for a model id, matching dated or tagged variants
///
/// Falls back to the longest catalog id the model starts with, so
/// `gpt-4o-2024-08-06` resolves to `gpt-4o` and `llama3.2:3b` to `llama3.2`.
pub fn lookup(kind: ProviderKind, model: &str) -> Option<&'static ModelInfo> {
    find_exact(kind, model).or_else(|| {
        let id = canonical_id(kind, model);
        models(kind)
            .iter()
            .filter(|m| id.starts_with(m.id))
            .max_by_key(|m| m.id.len())
    })
}
