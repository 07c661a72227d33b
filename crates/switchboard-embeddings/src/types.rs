use serde::{Deserialize, Serialize};
use switchboard_llm::Usage;

/// Texts to embed
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmbeddingRequest {
    /// Input texts, embedded in order
    pub inputs: Vec<String>,
    /// Output dimensions; overrides the configured value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
}

impl EmbeddingRequest {
    /// Request for the given texts
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            dimensions: None,
        }
    }
}

/// One vector per input, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    /// Token accounting, absent when the provider reports none
    pub usage: Option<Usage>,
    /// Model that produced the vectors
    pub model: String,
}
