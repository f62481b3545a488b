//! The tool trait and execution context.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use keel_core::tools::{ToolDefinition, ToolOutput};

use crate::errors::ToolError;

/// Execution context passed to every tool invocation.
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Unique ID of this tool call.
    pub tool_call_id: String,
    /// Session ID of the agent invoking this tool.
    pub session_id: String,
    /// Working directory for path resolution.
    pub working_directory: String,
    /// Cancellation token for cooperative cancellation.
    ///
    /// Cancelled when the session is interrupted; long-running tools
    /// should observe it, though cancellation is best-effort.
    pub cancellation: CancellationToken,
}

/// The core trait that every tool must implement.
///
/// Each tool provides:
/// - **Schema** via [`definition()`](AgentTool::definition) — sent to the model
/// - **Execution** via [`execute()`](AgentTool::execute) — invoked with JSON input
/// - **Classification** — `read_only` feeds the default permission mode's
///   built-in allowlist; `network_capable` opts the tool into the sandbox's
///   domain checks
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// Tool name — the exact string sent to/from the model.
    fn name(&self) -> &str;

    /// Whether this tool only reads state. Read-only tools are allowed
    /// without a gate in the default permission mode.
    fn read_only(&self) -> bool {
        false
    }

    /// Whether this tool reaches the network (subject to the sandbox's
    /// domain allowlist).
    fn network_capable(&self) -> bool {
        false
    }

    /// Generate the [`ToolDefinition`] schema for the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with JSON input.
    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;
}
