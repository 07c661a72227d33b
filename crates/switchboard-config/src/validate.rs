use crate::{BridgeConfig, EmbeddingConfig, EmbeddingProviderType, ProviderType};

/// Every problem found while validating a configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid configuration: {}", violations.join("; "))]
pub struct ConfigViolations {
    /// Human-readable violations, in discovery order
    pub violations: Vec<String>,
}

impl ConfigViolations {
    /// Wrap a list of violations, returning `Ok` when it is empty
    ///
    /// # Errors
    ///
    /// Returns the violations when at least one was collected
    pub fn check(violations: Vec<String>) -> Result<(), Self> {
        if violations.is_empty() { Ok(()) } else { Err(Self { violations }) }
    }
}

impl BridgeConfig {
    /// Collect configuration problems that do not depend on the model catalog
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();

        if self.model.trim().is_empty() {
            out.push("model must not be empty".to_owned());
        }

        let provider = self.resolved_provider();
        if provider.is_none() && !self.model.trim().is_empty() {
            out.push(format!(
                "provider is not set and cannot be inferred from model `{}`",
                self.model
            ));
        }

        let temperature_max = if provider == Some(ProviderType::Anthropic) { 1.0 } else { 2.0 };
        let d = &self.defaults;
        check_range(&mut out, "temperature", d.temperature, 0.0, temperature_max);
        check_range(&mut out, "top_p", d.top_p, 0.0, 1.0);
        check_range(&mut out, "frequency_penalty", d.frequency_penalty, -2.0, 2.0);
        check_range(&mut out, "presence_penalty", d.presence_penalty, -2.0, 2.0);

        if d.top_k == Some(0) {
            out.push("top_k must be greater than 0".to_owned());
        }
        if d.max_tokens == Some(0) {
            out.push("max_tokens must be greater than 0".to_owned());
        }
        if self.max_output_tokens == Some(0) {
            out.push("max_output_tokens must be greater than 0".to_owned());
        }

        if let Some(ref timeout) = self.timeout
            && duration_str::parse(timeout).is_err()
        {
            out.push(format!("timeout `{timeout}` is not a valid duration"));
        }

        match provider {
            Some(ProviderType::Bedrock) => {
                if self.bedrock.as_ref().and_then(|b| b.region.as_deref()).is_none() {
                    out.push("bedrock provider requires bedrock.region".to_owned());
                }
            }
            Some(ProviderType::OpenaiCompatible) => {
                if self.base_url.is_none() {
                    out.push("openai_compatible provider requires base_url".to_owned());
                }
            }
            _ => {}
        }

        if self.system_prompt.is_some() && provider != Some(ProviderType::OpenaiCompatible) {
            out.push("system_prompt is only supported by the openai_compatible provider".to_owned());
        }

        out
    }
}

impl EmbeddingConfig {
    /// Collect configuration problems for an embedding bridge
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();

        if self.model.trim().is_empty() {
            out.push("model must not be empty".to_owned());
        }
        if self.provider == EmbeddingProviderType::OpenaiCompatible && self.base_url.is_none() {
            out.push("openai_compatible provider requires base_url".to_owned());
        }
        if self.dimensions == Some(0) {
            out.push("dimensions must be greater than 0".to_owned());
        }
        if let Some(ref timeout) = self.timeout
            && duration_str::parse(timeout).is_err()
        {
            out.push(format!("timeout `{timeout}` is not a valid duration"));
        }

        out
    }
}

fn check_range(out: &mut Vec<String>, field: &str, value: Option<f64>, min: f64, max: f64) {
    if let Some(v) = value
        && !(min..=max).contains(&v)
    {
        out.push(format!("{field} must be between {min} and {max}, got {v}"));
    }
}
