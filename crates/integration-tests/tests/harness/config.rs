//! Bridge configurations pointed at a mock provider

use switchboard_config::{BridgeConfig, EmbeddingConfig, EmbeddingProviderType, ProviderType};
use switchboard_llm::Bridge;

use super::mock_provider::MockProvider;

/// Path prefix each provider family puts in front of its endpoints
const fn prefix(provider: &ProviderType) -> &'static str {
    match provider {
        ProviderType::Anthropic | ProviderType::Openai | ProviderType::OpenaiCompatible | ProviderType::Xai => "/v1",
        ProviderType::Google => "/v1beta",
        ProviderType::Bedrock | ProviderType::Ollama => "",
    }
}

/// Config for `model` on `provider`, served by `mock`
pub fn bridge_config(mock: &MockProvider, provider: ProviderType, model: &str) -> BridgeConfig {
    let base_url = mock.url(prefix(&provider));
    BridgeConfig::new(model)
        .with_provider(provider)
        .with_base_url(base_url)
        .with_api_key("test-key")
}

/// Build a bridge from [`bridge_config`]
pub async fn bridge(mock: &MockProvider, provider: ProviderType, model: &str) -> Bridge {
    Bridge::new("test", &bridge_config(mock, provider, model)).await.unwrap()
}

/// Embedding config served by `mock`
pub fn embedding_config(mock: &MockProvider, provider: EmbeddingProviderType, model: &str) -> EmbeddingConfig {
    let base_url = match provider {
        EmbeddingProviderType::Ollama => mock.url(""),
        EmbeddingProviderType::Openai | EmbeddingProviderType::OpenaiCompatible => mock.url("/v1"),
    };
    EmbeddingConfig {
        provider,
        model: model.to_owned(),
        api_key: Some("test-key".to_owned().into()),
        base_url: Some(base_url),
        timeout: None,
        dimensions: None,
    }
}
