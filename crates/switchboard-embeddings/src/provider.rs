pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use switchboard_llm::BridgeError;

use crate::types::{EmbeddingRequest, EmbeddingResponse};

/// Implemented by each embedding backend
#[async_trait]
pub trait EmbeddingsProvider: Send + Sync {
    /// Embed every input of a non-empty request
    async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse, BridgeError>;

    /// Provider family name
    fn name(&self) -> &'static str;
}
