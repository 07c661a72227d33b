use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single embedding bridge
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Provider type
    pub provider: EmbeddingProviderType,
    /// Embedding model identifier
    pub model: String,
    /// API key
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Call-level timeout (e.g. "30s")
    #[serde(default)]
    pub timeout: Option<String>,
    /// Requested output dimensions, when the model supports truncation
    #[serde(default)]
    pub dimensions: Option<u32>,
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// `OpenAI` embeddings
    Openai,
    /// Any endpoint speaking the `OpenAI` embeddings wire format
    OpenaiCompatible,
    /// Ollama local embeddings
    Ollama,
}

impl EmbeddingConfig {
    /// Parsed call-level timeout
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout.as_deref().and_then(|s| duration_str::parse(s).ok())
    }
}
