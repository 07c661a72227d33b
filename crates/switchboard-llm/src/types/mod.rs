//! Normalized, provider-agnostic request and response types
//!
//! Every bridge maps these values onto its provider's wire format and back.
//! They are plain values: built by the caller, never mutated by a mapper.

pub mod content;
pub mod options;
pub mod response;
pub mod tool;

pub use content::{Content, Media, Message, Prompt, Role, ToolResultRef};
pub use options::{InvokeOptions, ReasoningEffort, ResponseFormat, SearchMode, SearchParameters, SearchSource};
pub use response::{Response, Usage};
pub use tool::{ToolCall, ToolChoice, ToolDeclaration};
