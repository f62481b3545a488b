//! Hook execution engine.
//!
//! Runs all hooks registered for an event in registration order and reduces
//! their outcomes into one merged [`HookOutcome`]:
//!
//! - **First deny wins** — a deny short-circuits the remaining hooks.
//! - **Context concatenates** — additional context from every hook is
//!   joined in order.
//! - **Input rewrites merge shallowly** — later hooks override earlier
//!   hooks per key.
//!
//! # Fault handling
//!
//! A handler fault (error or timeout) is a deny for `PreToolUse`
//! (fail-closed) and a logged no-op for every other event (fail-open).

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::registry::HookRegistry;
use crate::types::{HookContext, HookEvent, HookOutcome, PermissionOverride};

/// Default per-handler timeout when the handler does not declare one.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Hook execution engine. Owns the [`HookRegistry`].
pub struct HookEngine {
    registry: HookRegistry,
}

impl HookEngine {
    /// Create a new engine with the given registry.
    #[must_use]
    pub fn new(registry: HookRegistry) -> Self {
        Self { registry }
    }

    /// Execute all hooks matching the context, merging their outcomes.
    #[instrument(skip_all, fields(event = %context.event(), session_id = context.session_id()))]
    pub async fn execute(&self, context: &HookContext) -> HookOutcome {
        let event = context.event();
        let handlers = self.registry.handlers_for(event, context.tool_name());

        if handlers.is_empty() {
            return HookOutcome::none();
        }

        let mut merged_permission: Option<PermissionOverride> = None;
        let mut merged_reason: Option<String> = None;
        let mut contexts: Vec<String> = Vec::new();
        let mut merged_input: Option<Value> = None;

        for registered in handlers {
            let handler = &registered.handler;
            let timeout_ms = handler.timeout_ms().unwrap_or(DEFAULT_TIMEOUT_MS);

            let result = tokio::time::timeout(
                std::time::Duration::from_millis(timeout_ms),
                handler.handle(context),
            )
            .await;

            let outcome = match result {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    if event.is_fail_closed() {
                        warn!(name = %handler.name(), error = %e, "hook fault (fail-closed)");
                        return HookOutcome::deny(format!("hook '{}' failed: {e}", handler.name()));
                    }
                    warn!(name = %handler.name(), error = %e, "hook fault (fail-open)");
                    continue;
                }
                Err(_) => {
                    if event.is_fail_closed() {
                        warn!(name = %handler.name(), timeout_ms, "hook timeout (fail-closed)");
                        return HookOutcome::deny(format!("hook '{}' timed out", handler.name()));
                    }
                    warn!(name = %handler.name(), timeout_ms, "hook timeout (fail-open)");
                    continue;
                }
            };

            if outcome.is_deny() {
                debug!(
                    name = %handler.name(),
                    reason = outcome.permission_decision_reason.as_deref().unwrap_or("(none)"),
                    "hook denied execution"
                );
                return outcome;
            }

            if let Some(decision) = outcome.permission_decision {
                merged_permission = Some(decision);
                if outcome.permission_decision_reason.is_some() {
                    merged_reason = outcome.permission_decision_reason;
                }
            }
            if let Some(ctx) = outcome.additional_context {
                contexts.push(ctx);
            }
            if let Some(input) = outcome.updated_input {
                merged_input = Some(merge_json(merged_input.as_ref(), &input));
            }
        }

        HookOutcome {
            permission_decision: merged_permission,
            permission_decision_reason: merged_reason,
            additional_context: if contexts.is_empty() {
                None
            } else {
                Some(contexts.join("\n"))
            },
            updated_input: merged_input,
        }
    }

    /// Whether any handler is registered for the event.
    #[must_use]
    pub fn has_handlers(&self, event: HookEvent) -> bool {
        self.registry.has_handlers(event)
    }

    /// Get a reference to the hook registry.
    #[must_use]
    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }
}

impl std::fmt::Debug for HookEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookEngine")
            .field("registry", &self.registry)
            .finish()
    }
}

/// Shallow-merge two JSON objects. `b` fields override `a` fields.
fn merge_json(a: Option<&Value>, b: &Value) -> Value {
    match (a, b) {
        (Some(Value::Object(base)), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let _ = merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => b.clone(),
    }
}
