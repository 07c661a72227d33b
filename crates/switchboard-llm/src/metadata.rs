//! Static bridge metadata

use serde::Serialize;
use switchboard_config::BridgeConfig;

use crate::catalog::{self, DEFAULT_CONTEXT_WINDOW, DEFAULT_MAX_OUTPUT_TOKENS, ModelInfo, Pricing};
use crate::convert::ModelTarget;
use crate::provider::ProviderKind;

/// What a bridge reports about itself, computed without network access
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeMetadata {
    /// Configured bridge name
    pub name: String,
    /// Library version
    pub version: &'static str,
    pub description: String,
    /// Model id sent to the provider
    pub model: String,
    /// Provider family
    pub provider: &'static str,
    /// Context window in tokens
    pub context_window: u32,
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Published pricing, when the model is in the catalog
    pub pricing: Option<Pricing>,
    pub capabilities: Capabilities,
}

/// Features a bridge supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    pub streaming: bool,
    pub tool_calling: bool,
    pub vision: bool,
    pub reasoning: bool,
}

impl BridgeMetadata {
    /// Metadata for a configured bridge
    ///
    /// Configured limits override the catalog; family defaults apply to
    /// models the catalog does not know.
    pub fn new(name: impl Into<String>, kind: ProviderKind, config: &BridgeConfig) -> Self {
        let info = catalog::lookup(kind, &config.model);

        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION"),
            description: format!("{} bridge for {}", kind.display_name(), config.model),
            model: config.model.clone(),
            provider: kind.as_str(),
            context_window: config
                .context_window
                .or_else(|| info.map(|m| m.context_window))
                .unwrap_or(DEFAULT_CONTEXT_WINDOW),
            max_tokens: max_output_tokens(info, config),
            pricing: info.and_then(|m| m.pricing),
            capabilities: Capabilities {
                streaming: true,
                tool_calling: true,
                vision: info.is_some_and(|m| m.vision),
                reasoning: info.is_some_and(|m| m.reasoning),
            },
        }
    }

    /// Model facts handed to the request mappers
    pub fn target(&self) -> ModelTarget {
        ModelTarget {
            model: self.model.clone(),
            max_output_tokens: self.max_tokens,
            reasoning: self.capabilities.reasoning,
        }
    }
}

fn max_output_tokens(info: Option<&ModelInfo>, config: &BridgeConfig) -> u32 {
    config
        .max_output_tokens
        .or_else(|| info.map(|m| m.max_output_tokens))
        .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS)
}
