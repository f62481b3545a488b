//! Sandbox policy.
//!
//! The sandbox layer restricts tool execution environment (commands,
//! network) independently of the permission gate. It classifies each
//! request before the gate runs:
//!
//! - Commands whose first word is on the static `excluded_commands`
//!   allowlist are *escaped and pre-approved* — they bypass the gate and
//!   `PreToolUse` hooks entirely (`PostToolUse` hooks still fire).
//! - A request carrying `dangerouslyDisableSandbox` that is not on the
//!   allowlist is escalated to the gate when `allow_unsandboxed_commands`
//!   is set, and denied outright otherwise.
//! - Network-capable tools are checked against the domain allowlist when
//!   one is configured, with local-binding and unix-socket exceptions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Network restrictions applied to network-capable tools.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSettings {
    /// Domains reachable by network-capable tools. Empty = unrestricted.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Allow connections to localhost regardless of the domain allowlist.
    #[serde(default)]
    pub allow_local_binding: bool,
    /// Allow unix-socket targets regardless of the domain allowlist.
    #[serde(default)]
    pub allow_unix_sockets: bool,
}

/// Sandbox configuration for a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxSettings {
    /// Whether sandboxing is enabled at all.
    #[serde(default)]
    pub enabled: bool,
    /// Command prefixes that always escape the sandbox, pre-approved.
    #[serde(default)]
    pub excluded_commands: Vec<String>,
    /// Whether `dangerouslyDisableSandbox` requests escalate to the gate
    /// instead of being denied.
    #[serde(default)]
    pub allow_unsandboxed_commands: bool,
    /// Network restrictions.
    #[serde(default)]
    pub network: NetworkSettings,
}

// ─────────────────────────────────────────────────────────────────────────────
// Verdict
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of a tool call by the sandbox stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SandboxVerdict {
    /// Runs inside the sandbox — continue to the gate and hooks as usual.
    Sandboxed,
    /// On the static exclusion allowlist — pre-approved, skip the gate and
    /// `PreToolUse` hooks.
    EscapedPreApproved,
    /// Unsandboxed execution requested — the gate must decide.
    EscalateToGate,
    /// Denied by sandbox policy.
    Deny(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Evaluates [`SandboxSettings`] against tool calls.
#[derive(Clone, Debug, Default)]
pub struct SandboxPolicy {
    settings: SandboxSettings,
}

impl SandboxPolicy {
    /// Create a policy from settings.
    #[must_use]
    pub fn new(settings: SandboxSettings) -> Self {
        Self { settings }
    }

    /// The underlying settings.
    #[must_use]
    pub fn settings(&self) -> &SandboxSettings {
        &self.settings
    }

    /// Classify a tool call.
    ///
    /// `network_capable` is the tool's own classification from its
    /// definition.
    #[must_use]
    pub fn evaluate(&self, tool_name: &str, input: &Value, network_capable: bool) -> SandboxVerdict {
        if !self.settings.enabled {
            return SandboxVerdict::Sandboxed;
        }

        let command = input.get("command").and_then(Value::as_str);

        if let Some(command) = command {
            if self.is_excluded(command) {
                debug!(tool_name, command, "command on exclusion allowlist, pre-approved");
                return SandboxVerdict::EscapedPreApproved;
            }

            let disable_requested = input
                .get("dangerouslyDisableSandbox")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if disable_requested {
                if self.settings.allow_unsandboxed_commands {
                    debug!(tool_name, command, "unsandboxed request escalated to gate");
                    return SandboxVerdict::EscalateToGate;
                }
                return SandboxVerdict::Deny("unsandboxed execution not permitted".into());
            }
        }

        if network_capable && !self.settings.network.allowed_domains.is_empty() {
            if let Some(url) = input.get("url").and_then(Value::as_str) {
                return self.check_network_target(url);
            }
        }

        SandboxVerdict::Sandboxed
    }

    /// Whether the command's first word is on the exclusion allowlist.
    fn is_excluded(&self, command: &str) -> bool {
        let first_word = command.split_whitespace().next().unwrap_or("");
        self.settings
            .excluded_commands
            .iter()
            .any(|excluded| excluded == first_word)
    }

    /// Check a URL against the network allowlist and its exceptions.
    fn check_network_target(&self, url: &str) -> SandboxVerdict {
        if url.starts_with("unix://") {
            return if self.settings.network.allow_unix_sockets {
                SandboxVerdict::Sandboxed
            } else {
                SandboxVerdict::Deny(format!("unix socket target not permitted: {url}"))
            };
        }

        let host = host_of(url);
        if is_local_host(&host) {
            return if self.settings.network.allow_local_binding {
                SandboxVerdict::Sandboxed
            } else {
                SandboxVerdict::Deny(format!("local binding not permitted: {host}"))
            };
        }

        let allowed = self
            .settings
            .network
            .allowed_domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")));
        if allowed {
            SandboxVerdict::Sandboxed
        } else {
            SandboxVerdict::Deny(format!("domain not in allowlist: {host}"))
        }
    }
}

/// Extract the host portion of a URL (scheme and path stripped).
fn host_of(url: &str) -> String {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let host_port = without_scheme.split('/').next().unwrap_or(without_scheme);
    host_port.split(':').next().unwrap_or(host_port).to_owned()
}

/// Whether the host refers to the local machine.
fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]" | "0.0.0.0")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
