use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use serde::{Deserialize, Serialize};
use switchboard_config::EmbeddingConfig;
use switchboard_llm::provider::{HttpClient, base_url, bearer};
use switchboard_llm::{BridgeError, ClassifyContext, Usage};

use super::EmbeddingsProvider;
use crate::types::{EmbeddingRequest, EmbeddingResponse};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// `/embeddings` client for `OpenAI` and compatible endpoints
pub struct OpenAiEmbeddingsProvider {
    http: HttpClient,
    url: String,
    model: String,
    dimensions: Option<u32>,
}

impl OpenAiEmbeddingsProvider {
    pub fn new(config: &EmbeddingConfig, ctx: ClassifyContext) -> Result<Self, BridgeError> {
        let mut headers = HeaderMap::new();
        if let Some(value) = bearer(config.api_key.as_ref())? {
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            http: HttpClient::new(headers, ctx),
            url: format!("{}/embeddings", base_url(config.base_url.as_ref(), DEFAULT_BASE_URL)),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    fn wire_request<'a>(&'a self, request: &'a EmbeddingRequest) -> WireRequest<'a> {
        WireRequest {
            input: &request.inputs,
            model: &self.model,
            encoding_format: "float",
            dimensions: request.dimensions.or(self.dimensions),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    input: &'a [String],
    model: &'a str,
    encoding_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    data: Vec<WireEmbedding>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
}

/// Vectors in input order, whatever order the provider listed them in
fn into_response(mut wire: WireResponse, fallback_model: &str) -> EmbeddingResponse {
    wire.data.sort_by_key(|d| d.index);
    EmbeddingResponse {
        embeddings: wire.data.into_iter().map(|d| d.embedding).collect(),
        usage: wire.usage.map(|u| Usage::new(u.prompt_tokens, 0)),
        model: wire.model.unwrap_or_else(|| fallback_model.to_owned()),
    }
}

#[async_trait]
impl EmbeddingsProvider for OpenAiEmbeddingsProvider {
    async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse, BridgeError> {
        let wire: WireResponse = self.http.post_json(&self.url, &self.wire_request(request)).await?;
        let response = into_response(wire, &self.model);

        if response.embeddings.len() != request.inputs.len() {
            return Err(BridgeError::response_parsing(
                format!(
                    "expected {} embeddings, provider returned {}",
                    request.inputs.len(),
                    response.embeddings.len()
                ),
                None,
            ));
        }

        tracing::debug!(provider = self.name(), count = response.embeddings.len(), "embeddings complete");
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use switchboard_config::EmbeddingProviderType;

    use super::*;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            model: "text-embedding-3-small".to_owned(),
            api_key: None,
            base_url: None,
            timeout: None,
            dimensions: Some(256),
        }
    }

    #[test]
    fn request_carries_dimensions_with_call_override() {
        let provider = OpenAiEmbeddingsProvider::new(&config(), ClassifyContext::default()).unwrap();
        assert_eq!(provider.url, "https://api.openai.com/v1/embeddings");

        let mut request = EmbeddingRequest::new(["a", "b"]);
        assert_eq!(
            serde_json::to_value(provider.wire_request(&request)).unwrap(),
            json!({"input": ["a", "b"], "model": "text-embedding-3-small", "encoding_format": "float", "dimensions": 256})
        );

        request.dimensions = Some(64);
        assert_eq!(serde_json::to_value(provider.wire_request(&request)).unwrap()["dimensions"], 64);
    }

    #[test]
    fn data_is_reordered_by_index() {
        let wire: WireResponse = serde_json::from_value(json!({
            "object": "list",
            "data": [
                {"object": "embedding", "embedding": [2.0], "index": 1},
                {"object": "embedding", "embedding": [1.0], "index": 0}
            ],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }))
        .unwrap();

        let response = into_response(wire, "fallback");
        assert_eq!(response.embeddings, vec![vec![1.0], vec![2.0]]);
        assert_eq!(response.usage, Some(Usage::new(4, 0)));
        assert_eq!(response.model, "text-embedding-3-small");
    }
}
