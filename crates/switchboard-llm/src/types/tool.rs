use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A function the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// JSON Schema object describing the arguments, carried through unchanged
    pub parameters: Value,
}

impl ToolDeclaration {
    /// Declare a tool
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A normalized tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id, provider-supplied or synthesized
    pub id: String,
    /// Function name
    pub name: String,
    /// Parsed arguments
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Build a tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// How the model should select tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model decides
    Auto,
    /// Model must not call tools
    None,
    /// Model must call at least one tool
    Required,
    /// Model must call the named tool
    Tool(String),
}
