//! Tool error types.

/// Errors raised during tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// No tool with the requested name is registered.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The input payload did not match the tool's schema.
    #[error("invalid input for '{tool_name}': {message}")]
    InvalidInput {
        /// Tool name.
        tool_name: String,
        /// Validation failure description.
        message: String,
    },

    /// The tool failed while executing.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Execution was cancelled via the context's cancellation token.
    #[error("operation cancelled")]
    Cancelled,
}
