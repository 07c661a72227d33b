//! Anthropic Messages API client

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::ExposeSecret;
use switchboard_config::BridgeConfig;

use super::http::{self, HttpClient};
use super::{Provider, ProviderKind};
use crate::catalog;
use crate::classify::ClassifyContext;
use crate::convert::anthropic::{AnthropicStream, build_request, parse_response};
use crate::convert::{ModelTarget, ResolvedParams};
use crate::error::BridgeError;
use crate::protocol::anthropic::{MessagesResponse, StreamEvent};
use crate::stream::{ResponseStream, reconstruct, sse_frames};
use crate::types::{Prompt, Response};

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Beta enabling the 1M token context window
const CONTEXT_1M_BETA: &str = "context-1m-2025-08-07";

/// Beta enabling 128k output tokens
const OUTPUT_128K_BETA: &str = "output-128k-2025-02-19";

/// Anthropic Messages API client
pub struct AnthropicProvider {
    http: HttpClient,
    url: String,
    target: ModelTarget,
}

impl AnthropicProvider {
    /// Create from bridge configuration
    pub fn new(config: &BridgeConfig, target: ModelTarget, ctx: ClassifyContext) -> Result<Self, BridgeError> {
        let mut headers = http::extra_headers(&config.headers)?;
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        if let Some(key) = &config.api_key {
            headers.insert(
                HeaderName::from_static("x-api-key"),
                http::secret_header(key.expose_secret())?,
            );
        }
        add_beta_header(&mut headers, config, &target.model);

        Ok(Self {
            http: HttpClient::new(headers, ctx),
            url: format!("{}/messages", http::base_url(config.base_url.as_ref(), DEFAULT_BASE_URL)),
            target,
        })
    }
}

/// Add `anthropic-beta` for enabled features the model supports
///
/// Unsupported features are left out rather than failing the bridge.
fn add_beta_header(headers: &mut HeaderMap, config: &BridgeConfig, model: &str) {
    let info = catalog::lookup(ProviderKind::Anthropic, model);
    let mut betas = Vec::new();

    if config.features.extended_context {
        if info.is_some_and(|m| m.extended_context) {
            betas.push(CONTEXT_1M_BETA);
        } else {
            tracing::debug!(model, "extended_context not supported by model, beta omitted");
        }
    }
    if config.features.extended_output {
        if info.is_some_and(|m| m.extended_output) {
            betas.push(OUTPUT_128K_BETA);
        } else {
            tracing::debug!(model, "extended_output not supported by model, beta omitted");
        }
    }

    if !betas.is_empty()
        && let Ok(value) = HeaderValue::from_str(&betas.join(","))
    {
        headers.insert(HeaderName::from_static("anthropic-beta"), value);
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn invoke(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<Response, BridgeError> {
        let request = build_request(prompt, params, &self.target)?;
        let response: MessagesResponse = self.http.post_json(&self.url, &request).await?;
        parse_response(response)
    }

    async fn invoke_stream(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<ResponseStream, BridgeError> {
        let mut request = build_request(prompt, params, &self.target)?;
        request.stream = Some(true);

        let response = self.http.post_stream(&self.url, &request).await?;
        let ctx = self.http.ctx().clone();
        Ok(reconstruct(
            sse_frames::<StreamEvent>(response, ctx.clone()),
            AnthropicStream::new(ctx),
        ))
    }
}
