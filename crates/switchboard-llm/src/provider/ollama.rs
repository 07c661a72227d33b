//! Ollama `/api/chat` client

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use switchboard_config::BridgeConfig;

use super::http::{self, HttpClient};
use super::{Provider, ProviderKind};
use crate::classify::ClassifyContext;
use crate::convert::ollama::{OllamaStream, build_request, parse_response};
use crate::convert::{ModelTarget, ResolvedParams};
use crate::error::BridgeError;
use crate::protocol::ollama::ChatResponse;
use crate::stream::{ResponseStream, ndjson_frames, reconstruct};
use crate::types::{Prompt, Response};

/// Default local Ollama server
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama chat client
pub struct OllamaProvider {
    http: HttpClient,
    url: String,
    target: ModelTarget,
}

impl OllamaProvider {
    /// Create from bridge configuration
    ///
    /// An API key is optional and only sent when configured, for servers
    /// behind an authenticating proxy.
    pub fn new(config: &BridgeConfig, target: ModelTarget, ctx: ClassifyContext) -> Result<Self, BridgeError> {
        let mut headers = http::extra_headers(&config.headers)?;
        if let Some(value) = http::bearer(config.api_key.as_ref())? {
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            http: HttpClient::new(headers, ctx),
            url: format!("{}/api/chat", http::base_url(config.base_url.as_ref(), DEFAULT_BASE_URL)),
            target,
        })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn invoke(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<Response, BridgeError> {
        let request = build_request(prompt, params, &self.target)?;
        let response: ChatResponse = self.http.post_json(&self.url, &request).await?;
        parse_response(response, self.http.ctx())
    }

    async fn invoke_stream(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<ResponseStream, BridgeError> {
        let mut request = build_request(prompt, params, &self.target)?;
        request.stream = true;

        let response = self.http.post_stream(&self.url, &request).await?;
        let ctx = self.http.ctx().clone();
        Ok(reconstruct(
            ndjson_frames::<ChatResponse>(response, ctx.clone()),
            OllamaStream::new(ctx),
        ))
    }
}
