//! Embedding bridges
//!
//! An [`EmbeddingBridge`] turns texts into vectors through an `OpenAI`
//! compatible `/embeddings` endpoint or a local Ollama server. Failures share
//! the chat bridges' [`BridgeError`] taxonomy.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod provider;
mod types;

use switchboard_config::{ConfigViolations, EmbeddingConfig, EmbeddingProviderType};
use switchboard_llm::{BridgeError, ClassifyContext};

pub use types::{EmbeddingRequest, EmbeddingResponse};

use provider::EmbeddingsProvider;
use provider::ollama::OllamaEmbeddingsProvider;
use provider::openai::OpenAiEmbeddingsProvider;

/// One configured embedding model
pub struct EmbeddingBridge {
    name: String,
    provider: Box<dyn EmbeddingsProvider>,
}

impl EmbeddingBridge {
    /// Validate `config` and build the provider client
    pub fn new(name: impl Into<String>, config: &EmbeddingConfig) -> Result<Self, BridgeError> {
        ConfigViolations::check(config.violations())?;

        let provider_name = match config.provider {
            EmbeddingProviderType::Openai => "openai",
            EmbeddingProviderType::OpenaiCompatible => "openai_compatible",
            EmbeddingProviderType::Ollama => "ollama",
        };
        let ctx = ClassifyContext {
            provider: provider_name.to_owned(),
            model: config.model.clone(),
            timeout: config.timeout(),
            supported_models: Vec::new(),
        };

        let provider: Box<dyn EmbeddingsProvider> = match config.provider {
            EmbeddingProviderType::Openai | EmbeddingProviderType::OpenaiCompatible => {
                Box::new(OpenAiEmbeddingsProvider::new(config, ctx)?)
            }
            EmbeddingProviderType::Ollama => Box::new(OllamaEmbeddingsProvider::new(config, ctx)),
        };

        Ok(Self {
            name: name.into(),
            provider,
        })
    }

    /// Embed every input, in order
    pub async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse, BridgeError> {
        if request.inputs.is_empty() {
            return Err(BridgeError::invalid_request("embedding request has no inputs"));
        }

        tracing::debug!(
            bridge = %self.name,
            provider = self.provider.name(),
            inputs = request.inputs.len(),
            "embedding"
        );
        self.provider.embed(request).await
    }

    /// Configured bridge name
    pub fn name(&self) -> &str {
        &self.name
    }
}
