//! The caller-facing bridge
//!
//! A [`Bridge`] validates its configuration, resolves the provider family
//! once and then serves `invoke`, `invoke_stream` and `metadata`.

use switchboard_config::{BridgeConfig, ConfigViolations, SamplingDefaults};

use crate::catalog;
use crate::classify::ClassifyContext;
use crate::convert::ResolvedParams;
use crate::error::BridgeError;
use crate::metadata::BridgeMetadata;
use crate::provider::anthropic::AnthropicProvider;
use crate::provider::bedrock::BedrockProvider;
use crate::provider::google::GoogleProvider;
use crate::provider::ollama::OllamaProvider;
use crate::provider::openai::OpenAiProvider;
use crate::provider::{Provider, ProviderKind, header_violations};
use crate::stream::ResponseStream;
use crate::types::{InvokeOptions, Prompt, Response};

/// Provider client, one variant per wire format
enum Backend {
    Anthropic(AnthropicProvider),
    /// `OpenAI`, xAI and compatible endpoints
    OpenAi(OpenAiProvider),
    Google(GoogleProvider),
    Bedrock(BedrockProvider),
    Ollama(OllamaProvider),
}

impl Backend {
    fn provider(&self) -> &dyn Provider {
        match self {
            Self::Anthropic(p) => p,
            Self::OpenAi(p) => p,
            Self::Google(p) => p,
            Self::Bedrock(p) => p,
            Self::Ollama(p) => p,
        }
    }
}

/// One configured model behind a provider
///
/// Concurrent calls on the same bridge are independent; nothing per call is
/// stored on it.
pub struct Bridge {
    defaults: SamplingDefaults,
    metadata: BridgeMetadata,
    backend: Backend,
}

impl Bridge {
    /// Validate `config` and build the provider client
    ///
    /// Every violated constraint is reported in a single
    /// [`BridgeError::Configuration`].
    pub async fn new(name: impl Into<String>, config: &BridgeConfig) -> Result<Self, BridgeError> {
        let name = name.into();

        let mut violations = config.violations();
        violations.extend(header_violations(&config.headers));
        let kind = config.resolved_provider().map(|p| ProviderKind::from(&p));
        if let Some(kind) = kind {
            violations.extend(catalog_violations(kind, config));
        }
        ConfigViolations::check(violations)?;
        let Some(kind) = kind else {
            return Err(BridgeError::configuration(vec![format!(
                "provider is not set and cannot be inferred from model `{}`",
                config.model
            )]));
        };

        let metadata = BridgeMetadata::new(name, kind, config);
        let target = metadata.target();
        let ctx = ClassifyContext {
            provider: kind.as_str().to_owned(),
            model: config.model.clone(),
            timeout: config.timeout(),
            supported_models: catalog::model_ids(kind),
        };

        let backend = match kind {
            ProviderKind::Anthropic => Backend::Anthropic(AnthropicProvider::new(config, target, ctx)?),
            ProviderKind::OpenAi | ProviderKind::OpenAiCompatible | ProviderKind::Xai => {
                Backend::OpenAi(OpenAiProvider::new(kind, config, target, ctx)?)
            }
            ProviderKind::Google => Backend::Google(GoogleProvider::new(config, target, ctx)?),
            ProviderKind::Bedrock => Backend::Bedrock(BedrockProvider::new(config, target, ctx).await?),
            ProviderKind::Ollama => Backend::Ollama(OllamaProvider::new(config, target, ctx)?),
        };

        tracing::debug!(bridge = %metadata.name, provider = %kind, model = %metadata.model, "bridge ready");

        Ok(Self {
            defaults: config.defaults.clone(),
            metadata,
            backend,
        })
    }

    /// Provider family this bridge talks to
    pub fn kind(&self) -> ProviderKind {
        self.backend.provider().kind()
    }

    /// Static description of the bridge
    pub const fn metadata(&self) -> &BridgeMetadata {
        &self.metadata
    }

    /// Run a prompt to completion
    pub async fn invoke(&self, prompt: &Prompt, options: Option<&InvokeOptions>) -> Result<Response, BridgeError> {
        let params = self.resolve(options);
        tracing::debug!(bridge = %self.metadata.name, model = %self.metadata.model, "invoke");
        self.backend.provider().invoke(prompt, &params).await
    }

    /// Run a prompt, yielding normalized chunks as the provider produces them
    ///
    /// Dropping the returned stream releases the underlying connection.
    pub async fn invoke_stream(
        &self,
        prompt: &Prompt,
        options: Option<&InvokeOptions>,
    ) -> Result<ResponseStream, BridgeError> {
        let params = self.resolve(options);
        tracing::debug!(bridge = %self.metadata.name, model = %self.metadata.model, "invoke_stream");
        self.backend.provider().invoke_stream(prompt, &params).await
    }

    fn resolve(&self, options: Option<&InvokeOptions>) -> ResolvedParams {
        match options {
            Some(options) => ResolvedParams::resolve(options, &self.defaults),
            None => ResolvedParams::resolve(&InvokeOptions::default(), &self.defaults),
        }
    }
}

/// Problems only the model catalog can reveal
fn catalog_violations(kind: ProviderKind, config: &BridgeConfig) -> Vec<String> {
    if !config.strict_models || kind == ProviderKind::OpenAiCompatible {
        return Vec::new();
    }

    let Some(info) = catalog::lookup(kind, &config.model) else {
        return vec![format!(
            "model `{}` is not a known {} model (supported: {})",
            config.model,
            kind.display_name(),
            catalog::model_ids(kind).join(", ")
        )];
    };

    let mut out = Vec::new();
    if let Some(max_tokens) = config.defaults.max_tokens
        && max_tokens > info.max_output_tokens
    {
        out.push(format!(
            "max_tokens {max_tokens} exceeds the {} output limit of {}",
            info.id, info.max_output_tokens
        ));
    }
    out
}
