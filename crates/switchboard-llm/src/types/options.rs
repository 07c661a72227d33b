use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tool::{ToolChoice, ToolDeclaration};

/// Per-call overrides
///
/// Every field takes precedence over the bridge's configured defaults, which
/// in turn take precedence over provider defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvokeOptions {
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Frequency penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Tools offered to the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclaration>,
    /// Tool selection policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Output format constraint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    /// Reasoning effort hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Live search augmentation (xAI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchParameters>,
}

/// Output format constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free text
    Text,
    /// Any valid JSON object
    JsonObject,
    /// JSON conforming to a schema
    JsonSchema {
        /// Schema name
        name: String,
        /// JSON Schema
        schema: Value,
    },
}

/// Reasoning effort hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Minimal thinking
    Low,
    /// Balanced
    Medium,
    /// Maximum thinking
    High,
}

impl ReasoningEffort {
    /// Lowercase wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Thinking token budget used by providers that take a budget instead of a level
    pub const fn budget_tokens(self) -> u32 {
        match self {
            Self::Low => 1024,
            Self::Medium => 4096,
            Self::High => 16384,
        }
    }
}

/// Live search configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameters {
    /// When the provider should search
    #[serde(default)]
    pub mode: SearchMode,
    /// Whether citations are returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_citations: Option<bool>,
    /// Upper bound on consulted results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_search_results: Option<u32>,
    /// Earliest date considered (YYYY-MM-DD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<String>,
    /// Latest date considered (YYYY-MM-DD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<String>,
    /// Sources to search
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SearchSource>,
}

/// Search activation mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Model decides
    #[default]
    Auto,
    /// Always search
    On,
    /// Never search
    Off,
}

/// A search source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchSource {
    /// Web pages
    Web,
    /// Posts on X
    X,
    /// News articles
    News,
    /// Specific RSS feeds
    Rss {
        /// Feed URLs
        links: Vec<String>,
    },
}
