//! Permission gate.
//!
//! The gate is a single caller-supplied decision function for tool-call
//! approval. When no gate is configured, the session's [`PermissionMode`]
//! supplies the default decision.

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{PermissionMode, PolicyDecision};

/// Context passed to the gate alongside the tool call.
#[derive(Clone, Debug)]
pub struct GateContext {
    /// Session the call belongs to.
    pub session_id: String,
    /// Unique ID of the call under decision.
    pub tool_call_id: String,
}

/// A caller-supplied decision function for tool-call approval.
///
/// Invoked synchronously from the pipeline's perspective; it must return
/// within a bounded time or the pipeline stalls (a caller responsibility —
/// the runtime imposes no internal timeout here).
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Decide whether the tool call may execute, optionally rewriting its
    /// input.
    async fn can_use(&self, tool_name: &str, input: &Value, ctx: &GateContext) -> PolicyDecision;
}

/// Tool names treated as edits for [`PermissionMode::AcceptEdits`].
const EDIT_TOOLS: &[&str] = &["Write", "Edit"];

/// The decision the configured mode yields when no gate is present.
///
/// `read_only` is the tool's own classification from its definition.
#[must_use]
pub fn mode_default_decision(
    mode: PermissionMode,
    tool_name: &str,
    read_only: bool,
) -> PolicyDecision {
    match mode {
        PermissionMode::BypassPermissions => PolicyDecision::allow(),
        PermissionMode::AcceptEdits => {
            if read_only || EDIT_TOOLS.contains(&tool_name) {
                PolicyDecision::allow()
            } else {
                PolicyDecision::deny(format!(
                    "Tool '{tool_name}' requires approval and no permission gate is configured"
                ))
            }
        }
        PermissionMode::Default => {
            if read_only {
                PolicyDecision::allow()
            } else {
                PolicyDecision::deny(format!(
                    "Tool '{tool_name}' requires approval and no permission gate is configured"
                ))
            }
        }
    }
}
