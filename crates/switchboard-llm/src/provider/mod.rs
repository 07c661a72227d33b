//! Provider trait and per-family clients
//!
//! A client owns its transport and the model facts resolved at construction.
//! It builds the wire request through the matching `convert` module, sends it
//! and normalizes what comes back.

pub mod anthropic;
pub mod bedrock;
pub mod google;
mod http;
mod kind;
pub mod ollama;
pub mod openai;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

pub use http::{HttpClient, base_url, bearer, extra_headers, header_violations};
pub use kind::ProviderKind;

use crate::convert::ResolvedParams;
use crate::error::BridgeError;
use crate::stream::ResponseStream;
use crate::types::{Prompt, Response};

/// Implemented by each provider family client
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider family
    fn kind(&self) -> ProviderKind;

    /// Send a non-streaming request
    async fn invoke(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<Response, BridgeError>;

    /// Send a streaming request
    ///
    /// Resolves once the provider has accepted the request; chunks are pulled
    /// lazily from the returned stream.
    async fn invoke_stream(&self, prompt: &Prompt, params: &ResolvedParams) -> Result<ResponseStream, BridgeError>;
}

/// Await `future`, failing with `Timeout` once `timeout` elapses
pub(crate) async fn with_deadline<F: Future>(timeout: Option<Duration>, future: F) -> Result<F::Output, BridgeError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|elapsed| BridgeError::timeout(Some(limit), Some(Box::new(elapsed)))),
        None => Ok(future.await),
    }
}
