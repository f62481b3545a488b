//! Core types for the hook system.
//!
//! Defines hook events, contexts, and the [`HookOutcome`] effect map that
//! handlers return. Wire types use `camelCase` serde renaming.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle hook event.
///
/// `PreToolUse` and `PostToolUse` fire per tool call and honor matcher
/// patterns; the remaining events are session-level lifecycle transitions
/// for which matchers are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    /// Before a tool is executed. Can deny or rewrite the call.
    PreToolUse,
    /// After a tool has executed. Observation only.
    PostToolUse,
    /// When a query stops.
    Stop,
    /// When a delegated sub-agent session stops.
    SubagentStop,
    /// When a session starts.
    SessionStart,
    /// When a session ends.
    SessionEnd,
}

impl HookEvent {
    /// Whether matcher patterns apply to this event.
    ///
    /// Lifecycle events always match-all regardless of the registered
    /// pattern.
    #[must_use]
    pub fn is_tool_scoped(self) -> bool {
        matches!(self, Self::PreToolUse | Self::PostToolUse)
    }

    /// Whether a handler fault is treated as a deny (fail-closed).
    ///
    /// Only `PreToolUse` is fail-closed; every other event is fail-open.
    #[must_use]
    pub fn is_fail_closed(self) -> bool {
        matches!(self, Self::PreToolUse)
    }

    /// Returns all hook event variants.
    #[must_use]
    pub fn all() -> &'static [HookEvent] {
        &[
            Self::PreToolUse,
            Self::PostToolUse,
            Self::Stop,
            Self::SubagentStop,
            Self::SessionStart,
            Self::SessionEnd,
        ]
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreToolUse => write!(f, "PreToolUse"),
            Self::PostToolUse => write!(f, "PostToolUse"),
            Self::Stop => write!(f, "Stop"),
            Self::SubagentStop => write!(f, "SubagentStop"),
            Self::SessionStart => write!(f, "SessionStart"),
            Self::SessionEnd => write!(f, "SessionEnd"),
        }
    }
}

/// Permission override contributed by a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionOverride {
    /// Allow the call.
    Allow,
    /// Deny the call.
    Deny,
}

/// Effect map returned by a hook handler.
///
/// Recognized effect keys: a permission override, additional context text,
/// and an input rewrite. Outcomes from all matching hooks are merged, not
/// overwritten: the first deny wins, context is concatenated, and input
/// rewrites merge shallowly with later hooks taking precedence per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutcome {
    /// Permission override, if the hook takes a position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision: Option<PermissionOverride>,
    /// Reason attached to the permission decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,
    /// Context text to inject alongside the tool call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    /// Replacement tool input (JSON object, shallow-merged).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_input: Option<Value>,
}

impl HookOutcome {
    /// An empty outcome (no effects).
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A deny outcome with a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            permission_decision: Some(PermissionOverride::Deny),
            permission_decision_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// An explicit allow outcome.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            permission_decision: Some(PermissionOverride::Allow),
            ..Self::default()
        }
    }

    /// An outcome carrying additional context.
    #[must_use]
    pub fn with_context(context: impl Into<String>) -> Self {
        Self {
            additional_context: Some(context.into()),
            ..Self::default()
        }
    }

    /// An outcome rewriting the tool input.
    #[must_use]
    pub fn with_updated_input(input: Value) -> Self {
        Self {
            updated_input: Some(input),
            ..Self::default()
        }
    }

    /// Whether this outcome denies the operation.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.permission_decision == Some(PermissionOverride::Deny)
    }
}

/// Hook context — one variant per [`HookEvent`].
///
/// Passed to handlers so they can inspect the current lifecycle event.
/// All variants carry `session_id` and `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "hookEvent", rename_all = "camelCase")]
pub enum HookContext {
    /// Context for [`HookEvent::PreToolUse`].
    #[serde(rename_all = "camelCase")]
    PreToolUse {
        /// Session this hook fires in.
        session_id: String,
        /// ISO 8601 timestamp.
        timestamp: String,
        /// Tool being invoked.
        tool_name: String,
        /// Arguments passed to the tool.
        tool_input: Value,
        /// Unique ID for this tool call.
        tool_call_id: String,
    },
    /// Context for [`HookEvent::PostToolUse`].
    #[serde(rename_all = "camelCase")]
    PostToolUse {
        /// Session this hook fires in.
        session_id: String,
        /// ISO 8601 timestamp.
        timestamp: String,
        /// Tool that was invoked.
        tool_name: String,
        /// Unique ID for this tool call.
        tool_call_id: String,
        /// Serialized tool result.
        tool_response: Value,
        /// How long the tool call took.
        duration_ms: u64,
    },
    /// Context for [`HookEvent::Stop`].
    #[serde(rename_all = "camelCase")]
    Stop {
        /// Session this hook fires in.
        session_id: String,
        /// ISO 8601 timestamp.
        timestamp: String,
        /// Terminal result subtype for the query.
        result_subtype: String,
        /// Last assistant text, if any.
        final_message: Option<String>,
    },
    /// Context for [`HookEvent::SubagentStop`].
    #[serde(rename_all = "camelCase")]
    SubagentStop {
        /// Session this hook fires in.
        session_id: String,
        /// ISO 8601 timestamp.
        timestamp: String,
        /// Nested session ID.
        subagent_session_id: String,
        /// Agent profile that ran.
        agent_name: String,
        /// Terminal result subtype for the nested query.
        result_subtype: String,
    },
    /// Context for [`HookEvent::SessionStart`].
    #[serde(rename_all = "camelCase")]
    SessionStart {
        /// Session this hook fires in.
        session_id: String,
        /// ISO 8601 timestamp.
        timestamp: String,
        /// Model the session uses.
        model: String,
        /// Parent session when resumed or forked.
        parent_session_id: Option<String>,
    },
    /// Context for [`HookEvent::SessionEnd`].
    #[serde(rename_all = "camelCase")]
    SessionEnd {
        /// Session this hook fires in.
        session_id: String,
        /// ISO 8601 timestamp.
        timestamp: String,
        /// Messages accumulated in the session.
        message_count: u64,
    },
}

impl HookContext {
    /// Get the [`HookEvent`] for this context.
    #[must_use]
    pub fn event(&self) -> HookEvent {
        match self {
            Self::PreToolUse { .. } => HookEvent::PreToolUse,
            Self::PostToolUse { .. } => HookEvent::PostToolUse,
            Self::Stop { .. } => HookEvent::Stop,
            Self::SubagentStop { .. } => HookEvent::SubagentStop,
            Self::SessionStart { .. } => HookEvent::SessionStart,
            Self::SessionEnd { .. } => HookEvent::SessionEnd,
        }
    }

    /// Get the session ID from any context variant.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::PreToolUse { session_id, .. }
            | Self::PostToolUse { session_id, .. }
            | Self::Stop { session_id, .. }
            | Self::SubagentStop { session_id, .. }
            | Self::SessionStart { session_id, .. }
            | Self::SessionEnd { session_id, .. } => session_id,
        }
    }

    /// The tool name, for tool-scoped contexts.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::PreToolUse { tool_name, .. } | Self::PostToolUse { tool_name, .. } => {
                Some(tool_name)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_scoped_events() {
        assert!(HookEvent::PreToolUse.is_tool_scoped());
        assert!(HookEvent::PostToolUse.is_tool_scoped());
        assert!(!HookEvent::Stop.is_tool_scoped());
        assert!(!HookEvent::SessionStart.is_tool_scoped());
        assert!(!HookEvent::SessionEnd.is_tool_scoped());
        assert!(!HookEvent::SubagentStop.is_tool_scoped());
    }

    #[test]
    fn only_pre_tool_use_is_fail_closed() {
        assert!(HookEvent::PreToolUse.is_fail_closed());
        assert!(!HookEvent::PostToolUse.is_fail_closed());
        assert!(!HookEvent::Stop.is_fail_closed());
        assert!(!HookEvent::SubagentStop.is_fail_closed());
    }

    #[test]
    fn all_returns_six_variants() {
        assert_eq!(HookEvent::all().len(), 6);
    }

    #[test]
    fn event_display() {
        assert_eq!(HookEvent::PreToolUse.to_string(), "PreToolUse");
        assert_eq!(HookEvent::SubagentStop.to_string(), "SubagentStop");
    }

    #[test]
    fn outcome_none_is_empty() {
        let outcome = HookOutcome::none();
        assert!(outcome.permission_decision.is_none());
        assert!(outcome.additional_context.is_none());
        assert!(outcome.updated_input.is_none());
        assert!(!outcome.is_deny());
    }

    #[test]
    fn outcome_deny_carries_reason() {
        let outcome = HookOutcome::deny("dangerous command");
        assert!(outcome.is_deny());
        assert_eq!(
            outcome.permission_decision_reason.as_deref(),
            Some("dangerous command")
        );
    }

    #[test]
    fn outcome_allow_is_not_deny() {
        assert!(!HookOutcome::allow().is_deny());
    }

    #[test]
    fn outcome_serde_skips_none_fields() {
        let json = serde_json::to_string(&HookOutcome::none()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn outcome_serde_wire_keys() {
        let outcome = HookOutcome {
            permission_decision: Some(PermissionOverride::Deny),
            permission_decision_reason: Some("no".into()),
            additional_context: Some("ctx".into()),
            updated_input: Some(json!({"command": "echo safe"})),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["permissionDecision"], "deny");
        assert_eq!(json["permissionDecisionReason"], "no");
        assert_eq!(json["additionalContext"], "ctx");
        assert_eq!(json["updatedInput"]["command"], "echo safe");
    }

    #[test]
    fn context_event_and_session_accessors() {
        let ctx = HookContext::PreToolUse {
            session_id: "s1".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
            tool_name: "Bash".into(),
            tool_input: json!({"command": "ls"}),
            tool_call_id: "tc1".into(),
        };
        assert_eq!(ctx.event(), HookEvent::PreToolUse);
        assert_eq!(ctx.session_id(), "s1");
        assert_eq!(ctx.tool_name(), Some("Bash"));
    }

    #[test]
    fn lifecycle_context_has_no_tool_name() {
        let ctx = HookContext::Stop {
            session_id: "s1".into(),
            timestamp: "t".into(),
            result_subtype: "success".into(),
            final_message: None,
        };
        assert_eq!(ctx.event(), HookEvent::Stop);
        assert!(ctx.tool_name().is_none());
    }

    #[test]
    fn context_serde_tag() {
        let ctx = HookContext::SessionStart {
            session_id: "s1".into(),
            timestamp: "t".into(),
            model: "test-model".into(),
            parent_session_id: None,
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["hookEvent"], "sessionStart");
        assert_eq!(json["sessionId"], "s1");
    }

    #[test]
    fn context_serde_roundtrip_post_tool_use() {
        let ctx = HookContext::PostToolUse {
            session_id: "s1".into(),
            timestamp: "t".into(),
            tool_name: "Read".into(),
            tool_call_id: "tc1".into(),
            tool_response: json!({"content": "ok"}),
            duration_ms: 12,
        };
        let json = serde_json::to_string(&ctx).unwrap();
        let back: HookContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event(), HookEvent::PostToolUse);
        assert_eq!(back.tool_name(), Some("Read"));
    }
}
