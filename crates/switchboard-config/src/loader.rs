use std::path::Path;

use crate::{Config, ConfigViolations};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        tracing::debug!(
            bridges = config.bridges.len(),
            embeddings = config.embeddings.len(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Validate every configured bridge, collecting all violations
    ///
    /// Each violation is prefixed with the section it came from.
    ///
    /// # Errors
    ///
    /// Returns every violation found across all bridges
    pub fn validate(&self) -> Result<(), ConfigViolations> {
        let bridges = self.bridges.iter().flat_map(|(name, bridge)| {
            bridge
                .violations()
                .into_iter()
                .map(move |v| format!("bridges.{name}: {v}"))
        });
        let embeddings = self.embeddings.iter().flat_map(|(name, embedding)| {
            embedding
                .violations()
                .into_iter()
                .map(move |v| format!("embeddings.{name}: {v}"))
        });

        ConfigViolations::check(bridges.chain(embeddings).collect())
    }
}
