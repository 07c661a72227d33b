//! Configuration for switchboard bridges
//!
//! Bridges are declared in a TOML file under `[bridges.<name>]` and embedding
//! bridges under `[embeddings.<name>]`. Values may reference environment
//! variables with `{{ env.VAR }}` placeholders.

#![allow(clippy::must_use_candidate)]

pub mod bridge;
pub mod embeddings;
mod env;
mod loader;
mod validate;

use indexmap::IndexMap;
use serde::Deserialize;

pub use bridge::*;
pub use embeddings::*;
pub use validate::ConfigViolations;

/// Top-level switchboard configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Chat bridges keyed by name
    #[serde(default)]
    pub bridges: IndexMap<String, BridgeConfig>,
    /// Embedding bridges keyed by name
    #[serde(default)]
    pub embeddings: IndexMap<String, EmbeddingConfig>,
}
