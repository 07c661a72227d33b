//! Provider wire formats
//!
//! Plain serde records mirroring each provider's JSON. No behavior lives
//! here; the `convert` module maps between these and the normalized types.

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

use serde::Deserialize;

/// Error body returned by HTTP providers
///
/// Covers `{"error": {...}}` envelopes (`OpenAI`, Anthropic, Gemini) as well
/// as Ollama's `{"error": "message"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    /// Error payload
    #[serde(default)]
    pub error: Option<ErrorField>,
    /// Top-level message used by some compatible servers
    #[serde(default)]
    pub message: Option<String>,
}

/// Structured or plain error payload
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorField {
    /// Structured detail
    Detail(ErrorDetail),
    /// Bare message
    Message(String),
}

/// Structured error detail
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
    /// Error type (`OpenAI`, Anthropic)
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    /// Error code; a string for `OpenAI`, a number for Gemini
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    /// Canonical status name (Gemini)
    #[serde(default)]
    pub status: Option<String>,
}
