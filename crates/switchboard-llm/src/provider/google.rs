//! Google Gemini client

use async_trait::async_trait;
use reqwest::header::HeaderName;
use secrecy::ExposeSecret;
use switchboard_config::BridgeConfig;

use super::http::{self, HttpClient};
use super::{Provider, ProviderKind};
use crate::classify::ClassifyContext;
use crate::convert::google::{GeminiStream, build_request, parse_response};
use crate::convert::{ModelTarget, ResolvedParams};
use crate::error::BridgeError;
use crate::protocol::google::GenerateResponse;
use crate::stream::{ResponseStream, reconstruct, sse_frames};
use crate::types::{Prompt, Response};

/// Default Gemini API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` client
pub struct GoogleProvider {
    http: HttpClient,
    /// `{base}/models/{model}`
    model_url: String,
    target: ModelTarget,
}

impl GoogleProvider {
    /// Create from bridge configuration
    pub fn new(config: &BridgeConfig, target: ModelTarget, ctx: ClassifyContext) -> Result<Self, BridgeError> {
        let mut headers = http::extra_headers(&config.headers)?;
        if let Some(key) = &config.api_key {
            headers.insert(
                HeaderName::from_static("x-goog-api-key"),
                http::secret_header(key.expose_secret())?,
            );
        }

        let base = http::base_url(config.base_url.as_ref(), DEFAULT_BASE_URL);
        let model = target.model.trim_start_matches("models/");

        Ok(Self {
            http: HttpClient::new(headers, ctx),
            model_url: format!("{base}/models/{model}"),
            target,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}:generateContent", self.model_url)
    }

    fn stream_url(&self) -> String {
        format!("{}:streamGenerateContent?alt=sse", self.model_url)
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn invoke(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<Response, BridgeError> {
        let request = build_request(prompt, params, &self.target)?;
        let response: GenerateResponse = self.http.post_json(&self.generate_url(), &request).await?;
        parse_response(response)
    }

    async fn invoke_stream(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<ResponseStream, BridgeError> {
        let request = build_request(prompt, params, &self.target)?;
        let response = self.http.post_stream(&self.stream_url(), &request).await?;
        let ctx = self.http.ctx().clone();
        Ok(reconstruct(
            sse_frames::<GenerateResponse>(response, ctx.clone()),
            GeminiStream::new(ctx),
        ))
    }
}
