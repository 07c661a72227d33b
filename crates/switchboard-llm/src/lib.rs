//! Provider bridges for chat models
//!
//! A [`Bridge`] maps one normalized conversation model onto Anthropic,
//! `OpenAI`, Google Gemini, AWS Bedrock, Ollama, xAI and `OpenAI`-compatible
//! endpoints. Responses, streamed or not, come back in the same normalized
//! shape, and every failure is reported as a [`BridgeError`].

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod bridge;
pub mod catalog;
pub mod classify;
pub mod convert;
pub mod error;
pub mod metadata;
pub mod protocol;
pub mod provider;
pub mod stream;
pub mod types;

pub use bridge::Bridge;
pub use classify::ClassifyContext;
pub use error::{BridgeError, ErrorKind};
pub use metadata::{BridgeMetadata, Capabilities};
pub use provider::{Provider, ProviderKind};
pub use stream::ResponseStream;
pub use types::{
    Content, InvokeOptions, Media, Message, Prompt, ReasoningEffort, Response, ResponseFormat, Role, SearchMode,
    SearchParameters, SearchSource, ToolCall, ToolChoice, ToolDeclaration, ToolResultRef, Usage,
};
