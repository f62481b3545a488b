//! Tool definition and output types.
//!
//! Defines the schema for tools that the agent can invoke, plus the output
//! type returned by tool execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Tool schema
// ─────────────────────────────────────────────────────────────────────────────

/// JSON Schema-compatible parameter definition for a tool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolParameterSchema {
    /// Top-level JSON Schema type.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property definitions (when type is `object`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Map<String, Value>>,
    /// Required property names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Description of the schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Catch-all for additional JSON Schema properties.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ToolParameterSchema {
    /// An empty `object` schema (tool takes no required parameters).
    #[must_use]
    pub fn empty_object() -> Self {
        Self {
            schema_type: "object".into(),
            ..Default::default()
        }
    }
}

/// A tool definition sent to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique identifier).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: ToolParameterSchema,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool output
// ─────────────────────────────────────────────────────────────────────────────

/// Output of a tool execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    /// The tool output content.
    pub content: String,
    /// Optional structured details (tool-specific metadata).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Whether the execution resulted in an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolOutput {
    /// Whether this output carries an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// Create a simple text output.
#[must_use]
pub fn text_output(text: impl Into<String>) -> ToolOutput {
    ToolOutput {
        content: text.into(),
        details: None,
        is_error: None,
    }
}

/// Create an error output.
#[must_use]
pub fn error_output(message: impl Into<String>) -> ToolOutput {
    ToolOutput {
        content: message.into(),
        details: None,
        is_error: Some(true),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
