//! AWS Bedrock client using the Converse API

use std::fmt::Debug;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::types::ConverseOutput;
use futures_util::stream;
use secrecy::ExposeSecret;
use switchboard_config::{BedrockConfig, BridgeConfig};

use super::{Provider, ProviderKind, with_deadline};
use crate::classify::{self, ClassifyContext};
use crate::convert::bedrock::{ConverseStream, build_request, frame, parse_response, usage};
use crate::convert::{ModelTarget, ResolvedParams};
use crate::error::BridgeError;
use crate::stream::{ResponseStream, reconstruct};
use crate::types::{Prompt, Response};

/// Bedrock Converse client
pub struct BedrockProvider {
    client: BedrockClient,
    target: ModelTarget,
    ctx: ClassifyContext,
}

impl BedrockProvider {
    /// Create from bridge configuration
    ///
    /// Explicit credentials win; otherwise the default AWS credential chain
    /// is used.
    pub async fn new(config: &BridgeConfig, target: ModelTarget, ctx: ClassifyContext) -> Result<Self, BridgeError> {
        let Some(bedrock) = &config.bedrock else {
            return Err(BridgeError::configuration(vec![
                "bedrock provider requires bedrock.region".to_owned(),
            ]));
        };

        let client = build_client(bedrock, config.base_url.as_ref()).await?;
        Ok(Self { client, target, ctx })
    }
}

async fn build_client(config: &BedrockConfig, endpoint: Option<&url::Url>) -> Result<BedrockClient, BridgeError> {
    let Some(region) = config.region.clone() else {
        return Err(BridgeError::configuration(vec![
            "bedrock provider requires bedrock.region".to_owned(),
        ]));
    };

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(aws_config::Region::new(region));

    if let (Some(access_key), Some(secret_key)) = (&config.access_key_id, &config.secret_access_key) {
        let credentials = aws_credential_types::Credentials::new(
            access_key.expose_secret(),
            secret_key.expose_secret(),
            config.session_token.as_ref().map(|t| t.expose_secret().to_owned()),
            None,
            "switchboard-config",
        );
        loader = loader.credentials_provider(credentials);
    }
    if let Some(endpoint) = endpoint {
        loader = loader.endpoint_url(endpoint.as_str());
    }

    Ok(BedrockClient::new(&loader.load().await))
}

/// Classify an SDK failure by its exception name
fn sdk_error<E, R>(error: SdkError<E, R>, ctx: &ClassifyContext) -> BridgeError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    match &error {
        SdkError::TimeoutError(_) => return BridgeError::timeout(ctx.timeout, Some(Box::new(error))),
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            return BridgeError::timeout(ctx.timeout, Some(Box::new(error)));
        }
        SdkError::DispatchFailure(failure) if failure.is_io() => {
            return BridgeError::Network {
                message: DisplayErrorContext(&error).to_string(),
                source: Some(Box::new(error)),
            };
        }
        _ => {}
    }

    let code = error.code().map(str::to_owned);
    let message = error
        .message()
        .map_or_else(|| DisplayErrorContext(&error).to_string(), str::to_owned);
    classify::from_code(code.as_deref(), message, Some(Box::new(error)), ctx)
}

#[async_trait]
impl Provider for BedrockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bedrock
    }

    async fn invoke(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<Response, BridgeError> {
        let input = build_request(prompt, params, &self.target)?;
        let request = self
            .client
            .converse()
            .model_id(input.model_id)
            .set_system(input.system)
            .set_messages(Some(input.messages))
            .set_inference_config(input.inference_config)
            .set_tool_config(input.tool_config)
            .set_additional_model_request_fields(input.additional_fields);

        let output = with_deadline(self.ctx.timeout, request.send())
            .await?
            .map_err(|e| {
                tracing::error!(provider = %self.ctx.provider, error = %DisplayErrorContext(&e), "bedrock converse failed");
                sdk_error(e, &self.ctx)
            })?;

        let blocks = match output.output() {
            Some(ConverseOutput::Message(message)) => message.content(),
            _ => &[],
        };
        parse_response(blocks, output.stop_reason(), output.usage().map(usage))
    }

    async fn invoke_stream(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<ResponseStream, BridgeError> {
        let input = build_request(prompt, params, &self.target)?;
        let request = self
            .client
            .converse_stream()
            .model_id(input.model_id)
            .set_system(input.system)
            .set_messages(Some(input.messages))
            .set_inference_config(input.inference_config)
            .set_tool_config(input.tool_config)
            .set_additional_model_request_fields(input.additional_fields);

        let output = with_deadline(self.ctx.timeout, request.send())
            .await?
            .map_err(|e| {
                tracing::error!(provider = %self.ctx.provider, error = %DisplayErrorContext(&e), "bedrock converse_stream failed");
                sdk_error(e, &self.ctx)
            })?;

        // The receiver is dropped with the stream, closing the connection
        let ctx = self.ctx.clone();
        let frames = stream::unfold(Some(output.stream), move |receiver| {
            let ctx = ctx.clone();
            async move {
                let mut receiver = receiver?;
                loop {
                    match receiver.recv().await {
                        Ok(Some(event)) => {
                            if let Some(frame) = frame(event) {
                                return Some((Ok(frame), Some(receiver)));
                            }
                        }
                        Ok(None) => return None,
                        Err(e) => return Some((Err(sdk_error(e, &ctx)), None)),
                    }
                }
            }
        });

        Ok(reconstruct(frames, ConverseStream::default()))
    }
}
