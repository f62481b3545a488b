//! Sub-agent dispatcher.
//!
//! When the model calls the delegation tool, the dispatcher resolves the
//! named [`AgentProfile`], builds a nested session scoped to the profile's
//! tool subset, prompt, and model, and runs it to a terminal outcome —
//! synchronously from the parent turn's perspective. Failure in the nested
//! session surfaces as an error tool result, not a parent-session fault.
//!
//! Nested sessions cannot delegate further: their profile table is empty
//! and the delegation tool is never part of a scoped registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use keel_core::events::ResultOutcome;
use keel_core::ids::SessionId;
use keel_core::tools::{ToolDefinition, ToolOutput, ToolParameterSchema, error_output, text_output};
use keel_hooks::HookContext;
use keel_settings::{AgentProfile, SessionOptions};
use keel_store::SessionRecord;

use crate::agent;
use crate::budget::{BudgetController, BudgetLimits};
use crate::session::{SessionCore, SessionCoreParams};
use crate::stream::EventSink;

/// Name of the delegation tool.
pub(crate) const TASK_TOOL: &str = "Task";

/// Whether delegation is available for the session.
///
/// Requires at least one registered profile, and `Task` must survive the
/// session's tool filters.
pub(crate) fn task_available(options: &SessionOptions) -> bool {
    if options.agents.is_empty() {
        return false;
    }
    if options.disallowed_tools.iter().any(|t| t == TASK_TOOL) {
        return false;
    }
    options
        .allowed_tools
        .as_ref()
        .is_none_or(|allowed| allowed.iter().any(|t| t == TASK_TOOL))
}

/// The delegation tool schema, listing the registered profiles.
pub(crate) fn task_definition(agents: &HashMap<String, AgentProfile>) -> ToolDefinition {
    let mut names: Vec<&String> = agents.keys().collect();
    names.sort();
    let roster = names
        .iter()
        .map(|name| format!("- {name}: {}", agents[name.as_str()].description))
        .collect::<Vec<_>>()
        .join("\n");

    let mut properties = serde_json::Map::new();
    let _ = properties.insert(
        "agent".to_owned(),
        serde_json::json!({
            "type": "string",
            "description": "Name of the agent to delegate to",
        }),
    );
    let _ = properties.insert(
        "prompt".to_owned(),
        serde_json::json!({
            "type": "string",
            "description": "The task for the agent",
        }),
    );

    ToolDefinition {
        name: TASK_TOOL.to_owned(),
        description: format!("Delegate a task to a named agent.\nAvailable agents:\n{roster}"),
        parameters: ToolParameterSchema {
            schema_type: "object".into(),
            properties: Some(properties),
            required: Some(vec!["agent".into(), "prompt".into()]),
            description: None,
            extra: serde_json::Map::new(),
        },
    }
}

/// Run a delegation call to completion.
///
/// The parent turn blocks on the nested session; the nested session's
/// cost is charged to the parent's budget when it completes.
#[instrument(skip_all, fields(parent_session_id = %parent.id))]
pub(crate) async fn dispatch(parent: &Arc<SessionCore>, input: &Value) -> ToolOutput {
    let Some(agent_name) = input.get("agent").and_then(Value::as_str) else {
        return error_output("delegation input missing 'agent'");
    };
    let Some(prompt) = input.get("prompt").and_then(Value::as_str) else {
        return error_output("delegation input missing 'prompt'");
    };

    let Some(profile) = parent.options.agents.get(agent_name).cloned() else {
        warn!(agent_name, "unknown agent profile");
        return error_output(format!("unknown agent: {agent_name}"));
    };

    let provider = if let Some(model) = &profile.model {
        match parent.factory.create_for_model(model) {
            Ok(provider) => provider,
            Err(e) => {
                return error_output(format!("failed to create provider for '{model}': {e}"));
            }
        }
    } else {
        Arc::clone(&parent.provider)
    };

    // Nested budget: the profile's own limits, else the parent's remainder.
    let remaining = parent.budget.lock().remaining_limits();
    let limits = BudgetLimits {
        max_turns: profile.max_turns.unwrap_or(remaining.max_turns),
        max_budget_usd: profile.max_budget_usd.or(remaining.max_budget_usd),
        max_structured_output_retries: remaining.max_structured_output_retries,
    };

    let nested_id = SessionId::new().into_inner();
    let nested_options = SessionOptions {
        model: provider.model().to_owned(),
        system_prompt: Some(profile.prompt.clone()),
        working_directory: parent.options.working_directory.clone(),
        permission_mode: parent.options.permission_mode,
        sandbox: parent.options.sandbox.clone(),
        allowed_tools: None,
        disallowed_tools: Vec::new(),
        max_turns: limits.max_turns,
        max_budget_usd: limits.max_budget_usd,
        max_structured_output_retries: limits.max_structured_output_retries,
        output_schema: None,
        agents: HashMap::new(),
    };

    let nested = Arc::new(SessionCore::new(SessionCoreParams {
        id: nested_id.clone(),
        created_at: chrono::Utc::now().to_rfc3339(),
        parent_session_id: Some(parent.id.clone()),
        forked: false,
        options: nested_options,
        registry: parent.registry.scoped(&profile.tools),
        hooks: Arc::clone(&parent.hooks),
        gate: parent.gate.clone(),
        provider,
        factory: Arc::clone(&parent.factory),
        store: Arc::clone(&parent.store),
        stream_capacity: parent.stream_capacity,
        emits_init: false,
        history: Vec::new(),
        budget: BudgetController::new(limits),
    }));

    if let Err(e) = nested.store.put(&SessionRecord {
        id: nested_id.clone(),
        parent_session_id: Some(parent.id.clone()),
        forked: false,
        history: Vec::new(),
        turns_used: 0,
        total_cost_usd: 0.0,
        created_at: nested.created_at.clone(),
        updated_at: nested.created_at.clone(),
    }) {
        warn!(session_id = %nested_id, error = %e, "failed to persist nested session");
    }

    info!(agent_name, nested_session_id = %nested_id, "delegating to sub-agent");
    // Cancelling the parent query cancels the nested session with it.
    let watcher = tokio::spawn({
        let parent_cancel = parent.current_cancel();
        let nested_cancel = nested.current_cancel();
        async move {
            parent_cancel.cancelled().await;
            nested_cancel.cancel();
        }
    });

    // Recursive async: the nested query future is boxed.
    let sink = EventSink::null(&nested_id);
    let outcome = Box::pin(agent::run_query(&nested, prompt.to_owned(), &sink)).await;
    watcher.abort();

    // Charge the nested session's cost to the parent.
    let nested_cost = nested.budget.lock().cost_accrued();
    parent.budget.lock().add_cost(nested_cost);

    let stop_ctx = HookContext::SubagentStop {
        session_id: parent.id.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        subagent_session_id: nested_id.clone(),
        agent_name: agent_name.to_owned(),
        result_subtype: outcome.subtype().to_owned(),
    };
    let _ = parent.hooks.execute(&stop_ctx).await;

    match outcome {
        ResultOutcome::Success { result, .. } => text_output(result),
        other => error_output(format!(
            "agent '{agent_name}' failed: {}",
            other.subtype()
        )),
    }
}
