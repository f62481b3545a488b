//! Policy decision and permission mode types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The single decision produced for a tool call before execution.
///
/// Produced exactly once per call id; execution never occurs after a deny.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "behavior", rename_all = "lowercase")]
pub enum PolicyDecision {
    /// Execution may proceed, optionally with rewritten input.
    Allow {
        /// Replacement input, when a gate or hook rewrote it.
        #[serde(rename = "updatedInput", skip_serializing_if = "Option::is_none")]
        updated_input: Option<Value>,
    },
    /// Execution is denied.
    Deny {
        /// User-visible reason.
        message: String,
    },
}

impl PolicyDecision {
    /// Allow with the input unchanged.
    #[must_use]
    pub fn allow() -> Self {
        Self::Allow {
            updated_input: None,
        }
    }

    /// Allow with rewritten input.
    #[must_use]
    pub fn allow_with(updated_input: Value) -> Self {
        Self::Allow {
            updated_input: Some(updated_input),
        }
    }

    /// Deny with a reason.
    #[must_use]
    pub fn deny(message: impl Into<String>) -> Self {
        Self::Deny {
            message: message.into(),
        }
    }

    /// Whether this decision allows execution.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// Permission mode applied when no custom gate is configured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionMode {
    /// Only the built-in read-only tool set is allowed without a gate.
    #[default]
    #[serde(rename = "default")]
    Default,
    /// Read-only tools plus file edits are allowed without a gate.
    #[serde(rename = "acceptEdits")]
    AcceptEdits,
    /// Every tool call is allowed.
    #[serde(rename = "bypassPermissions")]
    BypassPermissions,
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::AcceptEdits => write!(f, "acceptEdits"),
            Self::BypassPermissions => write!(f, "bypassPermissions"),
        }
    }
}
