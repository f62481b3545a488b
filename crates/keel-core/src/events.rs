//! Typed events emitted by a session to its caller.
//!
//! A query produces an ordered, single-consumer sequence of [`AgentEvent`]s:
//! exactly one `Init` opens a fresh session's stream, and exactly one
//! `ResultFinal` closes each query. Serde field names are the wire contract;
//! the in-memory enum is the authoritative form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::ToolCall;

// ─────────────────────────────────────────────────────────────────────────────
// Base event
// ─────────────────────────────────────────────────────────────────────────────

/// Fields common to every event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Session this event belongs to.
    pub session_id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a base event stamped with the current time.
    #[must_use]
    pub fn now(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_owned(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal classification of a query. Exactly one closes each query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ResultOutcome {
    /// The query completed successfully.
    Success {
        /// Final assistant text.
        result: String,
        /// Validated structured output, when an output schema was configured.
        #[serde(rename = "structuredOutput", skip_serializing_if = "Option::is_none")]
        structured_output: Option<Value>,
        /// Turns consumed by this query.
        #[serde(rename = "numTurns")]
        num_turns: u32,
        /// Accumulated session cost in USD.
        #[serde(rename = "totalCostUsd")]
        total_cost_usd: f64,
    },
    /// The configured turn limit was reached.
    ErrorMaxTurns {
        /// Turns consumed.
        #[serde(rename = "numTurns")]
        num_turns: u32,
        /// Accumulated session cost in USD.
        #[serde(rename = "totalCostUsd")]
        total_cost_usd: f64,
    },
    /// The configured cost budget was exceeded.
    #[serde(rename = "error_max_budget_usd")]
    ErrorMaxBudget {
        /// Accumulated session cost in USD.
        #[serde(rename = "totalCostUsd")]
        total_cost_usd: f64,
        /// The configured budget.
        #[serde(rename = "maxBudgetUsd")]
        max_budget_usd: f64,
    },
    /// An unhandled model or tool fault ended the query.
    ErrorDuringExecution {
        /// Fault details, each attributable to a call id or lifecycle event.
        errors: Vec<String>,
        /// Turns consumed.
        #[serde(rename = "numTurns")]
        num_turns: u32,
        /// Accumulated session cost in USD.
        #[serde(rename = "totalCostUsd")]
        total_cost_usd: f64,
    },
    /// Structured-output validation failed at the configured retry limit.
    ErrorMaxStructuredOutputRetries {
        /// Validation failures observed.
        retries: u32,
        /// Accumulated session cost in USD.
        #[serde(rename = "totalCostUsd")]
        total_cost_usd: f64,
    },
}

impl ResultOutcome {
    /// Whether this outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The wire subtype string for this outcome.
    #[must_use]
    pub fn subtype(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::ErrorMaxTurns { .. } => "error_max_turns",
            Self::ErrorMaxBudget { .. } => "error_max_budget_usd",
            Self::ErrorDuringExecution { .. } => "error_during_execution",
            Self::ErrorMaxStructuredOutputRetries { .. } => {
                "error_max_structured_output_retries"
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent events
// ─────────────────────────────────────────────────────────────────────────────

/// An event emitted by the runtime to the stream consumer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Opens a fresh session's stream: identity plus a configuration echo.
    Init {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// Model the session will use.
        model: String,
        /// Names of the tools available to the session.
        tools: Vec<String>,
        /// Permission mode in effect.
        #[serde(rename = "permissionMode")]
        permission_mode: String,
    },
    /// A text segment produced by the assistant.
    AssistantText {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// The text segment.
        text: String,
    },
    /// A tool call requested by the assistant.
    AssistantToolCall {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// The requested call.
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },
    /// Result of a tool call (payload or error), including policy denials.
    ToolResult {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// ID of the call this result answers.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Result content.
        content: String,
        /// Whether the call failed or was denied.
        #[serde(rename = "isError")]
        is_error: bool,
    },
    /// Closes a query with its terminal outcome.
    ResultFinal {
        /// Common fields.
        #[serde(flatten)]
        base: BaseEvent,
        /// The terminal outcome.
        outcome: ResultOutcome,
    },
}

impl AgentEvent {
    /// The session ID this event belongs to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Init { base, .. }
            | Self::AssistantText { base, .. }
            | Self::AssistantToolCall { base, .. }
            | Self::ToolResult { base, .. }
            | Self::ResultFinal { base, .. } => &base.session_id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_event_now_stamps_session() {
        let base = BaseEvent::now("s1");
        assert_eq!(base.session_id, "s1");
        assert!(!base.timestamp.is_empty());
    }

    #[test]
    fn result_outcome_subtypes() {
        let success = ResultOutcome::Success {
            result: "done".into(),
            structured_output: None,
            num_turns: 2,
            total_cost_usd: 0.01,
        };
        assert!(success.is_success());
        assert_eq!(success.subtype(), "success");

        let max_turns = ResultOutcome::ErrorMaxTurns {
            num_turns: 5,
            total_cost_usd: 0.05,
        };
        assert!(!max_turns.is_success());
        assert_eq!(max_turns.subtype(), "error_max_turns");
    }

    #[test]
    fn result_outcome_wire_tags() {
        let budget = ResultOutcome::ErrorMaxBudget {
            total_cost_usd: 1.1,
            max_budget_usd: 1.0,
        };
        let json = serde_json::to_value(&budget).unwrap();
        assert_eq!(json["subtype"], "error_max_budget_usd");
        assert_eq!(json["maxBudgetUsd"], 1.0);

        let retries = ResultOutcome::ErrorMaxStructuredOutputRetries {
            retries: 3,
            total_cost_usd: 0.2,
        };
        let json = serde_json::to_value(&retries).unwrap();
        assert_eq!(json["subtype"], "error_max_structured_output_retries");
    }

    #[test]
    fn result_outcome_serde_roundtrip() {
        let outcome = ResultOutcome::ErrorDuringExecution {
            errors: vec!["model fault: timeout".into()],
            num_turns: 1,
            total_cost_usd: 0.0,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        let back: ResultOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn init_event_serde_shape() {
        let event = AgentEvent::Init {
            base: BaseEvent::now("s1"),
            model: "test-model".into(),
            tools: vec!["Read".into(), "Bash".into()],
            permission_mode: "default".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "init");
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["permissionMode"], "default");
        assert_eq!(json["tools"][1], "Bash");
    }

    #[test]
    fn tool_result_event_serde_shape() {
        let event = AgentEvent::ToolResult {
            base: BaseEvent::now("s1"),
            tool_call_id: "tc-1".into(),
            content: "denied: nope".into(),
            is_error: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["toolCallId"], "tc-1");
        assert_eq!(json["isError"], true);
    }

    #[test]
    fn assistant_tool_call_event_roundtrip() {
        let mut arguments = serde_json::Map::new();
        let _ = arguments.insert("command".into(), json!("git status"));
        let event = AgentEvent::AssistantToolCall {
            base: BaseEvent::now("s1"),
            tool_call: ToolCall::new("tc-1", "Bash", arguments),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn event_session_id_accessor() {
        let event = AgentEvent::AssistantText {
            base: BaseEvent::now("s-42"),
            text: "hi".into(),
        };
        assert_eq!(event.session_id(), "s-42");
    }

    #[test]
    fn result_final_event_carries_outcome() {
        let event = AgentEvent::ResultFinal {
            base: BaseEvent::now("s1"),
            outcome: ResultOutcome::Success {
                result: "ok".into(),
                structured_output: Some(json!({"score": 90})),
                num_turns: 3,
                total_cost_usd: 0.12,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "result_final");
        assert_eq!(json["outcome"]["subtype"], "success");
        assert_eq!(json["outcome"]["structuredOutput"]["score"], 90);
    }
}
