//! Configuration types.
//!
//! [`RuntimeSettings`] carries process-wide defaults loaded from the
//! settings file and environment. [`SessionOptions`] configures a single
//! session: model, prompt, tool filters, policy, budgets, output schema,
//! and the agent profile table used for delegation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use keel_policy::{PermissionMode, SandboxSettings};

// ─────────────────────────────────────────────────────────────────────────────
// Runtime settings
// ─────────────────────────────────────────────────────────────────────────────

/// Agent loop defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefaults {
    /// Default maximum turns per query.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Default structured-output validation retry limit.
    #[serde(default = "default_structured_retries")]
    pub max_structured_output_retries: u32,
    /// Default model when a session does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,
}

const fn default_max_turns() -> u32 {
    25
}

const fn default_structured_retries() -> u32 {
    3
}

fn default_model() -> String {
    "claude-sonnet-4-5".into()
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_structured_output_retries: default_structured_retries(),
            default_model: default_model(),
        }
    }
}

/// Message stream defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDefaults {
    /// Bounded event channel capacity. The producer awaits when the
    /// consumer lags this far behind.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

const fn default_event_buffer() -> usize {
    64
}

impl Default for StreamDefaults {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
        }
    }
}

/// Process-wide runtime settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSettings {
    /// Agent loop defaults.
    #[serde(default)]
    pub agent: AgentDefaults,
    /// Message stream defaults.
    #[serde(default)]
    pub stream: StreamDefaults,
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent profiles
// ─────────────────────────────────────────────────────────────────────────────

/// A named sub-agent profile, invocable via delegation.
///
/// Immutable after registration; looked up by name at delegation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    /// What this agent is for (shown to the delegating model).
    pub description: String,
    /// System prompt for the nested session.
    pub prompt: String,
    /// Tool names the nested session may use.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Model override; inherits the parent's model when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Nested turn budget; inherits the parent's remainder when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    /// Nested cost budget; inherits the parent's remainder when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_budget_usd: Option<f64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session options
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// System prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Working directory for tool execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// Permission mode applied when no gate is configured.
    #[serde(default)]
    pub permission_mode: PermissionMode,
    /// Sandbox configuration.
    #[serde(default)]
    pub sandbox: SandboxSettings,
    /// When set, only these tools are visible to the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
    /// Tools removed from the session's view.
    #[serde(default)]
    pub disallowed_tools: Vec<String>,
    /// Maximum turns per query.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Cost budget in USD. Unlimited when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_budget_usd: Option<f64>,
    /// Structured-output validation retry limit.
    #[serde(default = "default_structured_retries")]
    pub max_structured_output_retries: u32,
    /// JSON Schema the final structured payload must satisfy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// Named sub-agent profiles available for delegation.
    #[serde(default)]
    pub agents: HashMap<String, AgentProfile>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            model: default_model(),
            system_prompt: None,
            working_directory: None,
            permission_mode: PermissionMode::default(),
            sandbox: SandboxSettings::default(),
            allowed_tools: None,
            disallowed_tools: Vec::new(),
            max_turns: default_max_turns(),
            max_budget_usd: None,
            max_structured_output_retries: default_structured_retries(),
            output_schema: None,
            agents: HashMap::new(),
        }
    }
}
