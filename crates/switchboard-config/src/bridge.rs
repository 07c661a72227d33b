use std::time::Duration;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single chat bridge
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Provider family; inferred from the model id when absent
    #[serde(default)]
    pub provider: Option<ProviderType>,
    /// Model identifier sent to the provider
    pub model: String,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Call-level timeout (e.g. "30s", "2m")
    #[serde(default)]
    pub timeout: Option<String>,
    /// Configured sampling defaults
    #[serde(default)]
    pub defaults: SamplingDefaults,
    /// Additive provider feature flags
    #[serde(default)]
    pub features: FeatureFlags,
    /// Extra static headers sent with every HTTP request
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    /// How system text is carried by an OpenAI-compatible endpoint
    #[serde(default)]
    pub system_prompt: Option<SystemPromptMode>,
    /// Reject model ids missing from the built-in catalog
    #[serde(default)]
    pub strict_models: bool,
    /// Context window override for metadata
    #[serde(default)]
    pub context_window: Option<u32>,
    /// Maximum output tokens override for metadata and provider defaults
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// AWS Bedrock settings
    #[serde(default)]
    pub bedrock: Option<BedrockConfig>,
}

impl BridgeConfig {
    /// Minimal configuration for a model, with everything else defaulted
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            provider: None,
            model: model.into(),
            api_key: None,
            base_url: None,
            timeout: None,
            defaults: SamplingDefaults::default(),
            features: FeatureFlags::default(),
            headers: IndexMap::new(),
            system_prompt: None,
            strict_models: false,
            context_window: None,
            max_output_tokens: None,
            bedrock: None,
        }
    }

    /// Set the provider family explicitly
    #[must_use]
    pub const fn with_provider(mut self, provider: ProviderType) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    /// Provider family, explicit or inferred from the model id
    pub fn resolved_provider(&self) -> Option<ProviderType> {
        self.provider.clone().or_else(|| ProviderType::infer_from_model(&self.model))
    }

    /// Parsed call-level timeout
    ///
    /// Returns `None` when unset or unparseable; validation reports the latter.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.as_deref().and_then(|s| duration_str::parse(s).ok())
    }
}

/// Supported provider families
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Anthropic Messages API
    Anthropic,
    /// `OpenAI` Chat Completions API
    Openai,
    /// Any endpoint speaking the `OpenAI` Chat Completions wire format
    OpenaiCompatible,
    /// Google Gemini API
    Google,
    /// AWS Bedrock Converse API
    Bedrock,
    /// Ollama local model server
    Ollama,
    /// xAI Grok API
    Xai,
}

impl ProviderType {
    /// Infer the provider family from a model id prefix
    pub fn infer_from_model(model: &str) -> Option<Self> {
        const BEDROCK_VENDORS: [&str; 6] = ["anthropic.", "amazon.", "meta.", "mistral.", "cohere.", "ai21."];
        const BEDROCK_REGIONS: [&str; 3] = ["us.", "eu.", "apac."];

        let model = model.trim();

        let bedrock_id = BEDROCK_REGIONS
            .iter()
            .find_map(|region| model.strip_prefix(region))
            .unwrap_or(model);
        if BEDROCK_VENDORS.iter().any(|vendor| bedrock_id.starts_with(vendor)) {
            return Some(Self::Bedrock);
        }

        if model.starts_with("claude-") {
            Some(Self::Anthropic)
        } else if ["gpt-", "o1", "o3", "o4", "chatgpt-"].iter().any(|p| model.starts_with(p)) {
            Some(Self::Openai)
        } else if model.starts_with("gemini-") {
            Some(Self::Google)
        } else if model.starts_with("grok-") {
            Some(Self::Xai)
        } else {
            None
        }
    }

    /// Stable lowercase name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Openai => "openai",
            Self::OpenaiCompatible => "openai_compatible",
            Self::Google => "google",
            Self::Bedrock => "bedrock",
            Self::Ollama => "ollama",
            Self::Xai => "xai",
        }
    }
}

/// Sampling defaults applied when a call does not override them
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingDefaults {
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Top-k sampling
    #[serde(default)]
    pub top_k: Option<u32>,
    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Frequency penalty
    #[serde(default)]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty
    #[serde(default)]
    pub presence_penalty: Option<f64>,
    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
}

/// Additive, provider-specific capability flags
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureFlags {
    /// Request the extended context window where the model supports it
    #[serde(default)]
    pub extended_context: bool,
    /// Request the extended output limit where the model supports it
    #[serde(default)]
    pub extended_output: bool,
}

/// How system text reaches an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemPromptMode {
    /// Send system messages with the `system` role
    Native,
    /// Prepend system text to the first non-system message
    Prepend,
}

/// AWS Bedrock-specific configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BedrockConfig {
    /// AWS region
    #[serde(default)]
    pub region: Option<String>,
    /// Access key ID (optional, uses default credential chain if absent)
    #[serde(default)]
    pub access_key_id: Option<SecretString>,
    /// Secret access key
    #[serde(default)]
    pub secret_access_key: Option<SecretString>,
    /// Session token for temporary credentials
    #[serde(default)]
    pub session_token: Option<SecretString>,
}
