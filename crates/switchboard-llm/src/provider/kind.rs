use std::fmt;

use switchboard_config::ProviderType;

/// Closed set of provider families a bridge can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Anthropic Messages API
    Anthropic,
    /// `OpenAI` Chat Completions
    OpenAi,
    /// Any endpoint speaking the `OpenAI` Chat Completions format
    OpenAiCompatible,
    /// Google Gemini
    Google,
    /// AWS Bedrock Converse
    Bedrock,
    /// Ollama local server
    Ollama,
    /// xAI Grok
    Xai,
}

impl ProviderKind {
    /// Stable lowercase name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::OpenAiCompatible => "openai_compatible",
            Self::Google => "google",
            Self::Bedrock => "bedrock",
            Self::Ollama => "ollama",
            Self::Xai => "xai",
        }
    }

    /// Human-readable vendor name
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Anthropic => "Anthropic",
            Self::OpenAi => "OpenAI",
            Self::OpenAiCompatible => "OpenAI-compatible",
            Self::Google => "Google Gemini",
            Self::Bedrock => "AWS Bedrock",
            Self::Ollama => "Ollama",
            Self::Xai => "xAI",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ProviderType> for ProviderKind {
    fn from(value: &ProviderType) -> Self {
        match value {
            ProviderType::Anthropic => Self::Anthropic,
            ProviderType::Openai => Self::OpenAi,
            ProviderType::OpenaiCompatible => Self::OpenAiCompatible,
            ProviderType::Google => Self::Google,
            ProviderType::Bedrock => Self::Bedrock,
            ProviderType::Ollama => Self::Ollama,
            ProviderType::Xai => Self::Xai,
        }
    }
}
