use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use switchboard_config::EmbeddingConfig;
use switchboard_llm::provider::{HttpClient, base_url};
use switchboard_llm::{BridgeError, ClassifyContext, Usage};

use super::EmbeddingsProvider;
use crate::types::{EmbeddingRequest, EmbeddingResponse};

/// Default local Ollama server
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama `/api/embed` client
pub struct OllamaEmbeddingsProvider {
    http: HttpClient,
    url: String,
    model: String,
    dimensions: Option<u32>,
}

impl OllamaEmbeddingsProvider {
    pub fn new(config: &EmbeddingConfig, ctx: ClassifyContext) -> Self {
        Self {
            http: HttpClient::new(HeaderMap::new(), ctx),
            url: format!("{}/api/embed", base_url(config.base_url.as_ref(), DEFAULT_BASE_URL)),
            model: config.model.clone(),
            dimensions: config.dimensions,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
}

#[async_trait]
impl EmbeddingsProvider for OllamaEmbeddingsProvider {
    async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse, BridgeError> {
        let body = WireRequest {
            model: &self.model,
            input: &request.inputs,
            dimensions: request.dimensions.or(self.dimensions),
        };
        let wire: WireResponse = self.http.post_json(&self.url, &body).await?;

        tracing::debug!(provider = self.name(), count = wire.embeddings.len(), "embeddings complete");
        Ok(EmbeddingResponse {
            embeddings: wire.embeddings,
            usage: wire.prompt_eval_count.map(|n| Usage::new(n, 0)),
            model: wire.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}
