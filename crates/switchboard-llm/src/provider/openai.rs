//! Chat Completions client for `OpenAI`, xAI and compatible endpoints

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use switchboard_config::{BridgeConfig, SystemPromptMode};

use super::http::{self, HttpClient};
use super::{Provider, ProviderKind};
use crate::classify::ClassifyContext;
use crate::convert::openai::{ChatStream, Dialect, build_request, parse_response};
use crate::convert::{ModelTarget, ResolvedParams};
use crate::error::BridgeError;
use crate::protocol::openai::{ChatChunk, ChatResponse, StreamOptions};
use crate::stream::{ResponseStream, reconstruct, sse_frames};
use crate::types::{Prompt, Response};

/// Default `OpenAI` API base URL
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default xAI API base URL
const XAI_BASE_URL: &str = "https://api.x.ai/v1";

/// Host that understands `stream_options.include_usage`
const OPENAI_HOST: &str = "api.openai.com";

/// Chat Completions client
pub struct OpenAiProvider {
    http: HttpClient,
    url: String,
    target: ModelTarget,
    dialect: Dialect,
    include_usage: bool,
}

impl OpenAiProvider {
    /// Create from bridge configuration
    ///
    /// `kind` must be `OpenAi`, `OpenAiCompatible` or `Xai`.
    pub fn new(
        kind: ProviderKind,
        config: &BridgeConfig,
        target: ModelTarget,
        ctx: ClassifyContext,
    ) -> Result<Self, BridgeError> {
        let mut headers = http::extra_headers(&config.headers)?;
        if let Some(value) = http::bearer(config.api_key.as_ref())? {
            headers.insert(AUTHORIZATION, value);
        }

        let default_base = if kind == ProviderKind::Xai { XAI_BASE_URL } else { OPENAI_BASE_URL };
        let base = http::base_url(config.base_url.as_ref(), default_base);
        let include_usage = kind == ProviderKind::OpenAi
            && config
                .base_url
                .as_ref()
                .is_none_or(|url| url.host_str() == Some(OPENAI_HOST));

        Ok(Self {
            http: HttpClient::new(headers, ctx),
            url: format!("{base}/chat/completions"),
            target,
            dialect: Dialect {
                provider: kind,
                system_prompt: config.system_prompt.unwrap_or(SystemPromptMode::Native),
            },
            include_usage,
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        self.dialect.provider
    }

    async fn invoke(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<Response, BridgeError> {
        let request = build_request(prompt, params, &self.target, self.dialect)?;
        let response: ChatResponse = self.http.post_json(&self.url, &request).await?;
        parse_response(response)
    }

    async fn invoke_stream(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<ResponseStream, BridgeError> {
        let mut request = build_request(prompt, params, &self.target, self.dialect)?;
        request.stream = Some(true);
        if self.include_usage {
            request.stream_options = Some(StreamOptions { include_usage: true });
        }

        let response = self.http.post_stream(&self.url, &request).await?;
        let ctx = self.http.ctx().clone();
        Ok(reconstruct(sse_frames::<ChatChunk>(response, ctx.clone()), ChatStream::new(ctx)))
    }
}
