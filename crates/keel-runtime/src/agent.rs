//! The query driver — one prompt to one terminal [`ResultOutcome`].
//!
//! Loop shape: budget pre-check → model turn → emit content → execute tool
//! calls through the policy pipeline → append results → repeat. The loop
//! ends when the model signals `end_turn` with no tool calls (validating
//! structured output first when a schema is configured), when a budget
//! limit trips, when an interrupt lands, or when a model fault surfaces.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use keel_core::events::ResultOutcome;
use keel_core::messages::{AssistantContent, Message, StopReason};
use keel_core::tools::{ToolOutput, error_output};
use keel_hooks::HookContext;
use keel_model::{ModelRequest, ModelTurn, pricing};
use keel_policy::PolicyDecision;
use keel_tools::ToolContext;

use crate::budget::BudgetStop;
use crate::dispatcher::{self, TASK_TOOL};
use crate::pipeline::{self, PolicyStages};
use crate::session::SessionCore;
use crate::stream::EventSink;

/// Drive one query to its terminal outcome, emitting events along the way.
///
/// Exactly one `ResultFinal` event closes the stream; the outcome is also
/// returned for callers that run nested sessions.
#[instrument(skip_all, fields(session_id = %core.id))]
pub(crate) async fn run_query(
    core: &Arc<SessionCore>,
    prompt: String,
    sink: &EventSink,
) -> ResultOutcome {
    let cancel = core.current_cancel();
    let task_ok = dispatcher::task_available(&core.options);

    if core.take_init_emission() {
        let mut tools = core.registry.names();
        if task_ok {
            tools.push(TASK_TOOL.to_owned());
            tools.sort();
        }
        sink.init(
            core.provider.model(),
            tools,
            core.options.permission_mode.to_string(),
        )
        .await;
    }

    if core.take_session_start() {
        let ctx = HookContext::SessionStart {
            session_id: core.id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            model: core.provider.model().to_owned(),
            parent_session_id: core.parent_session_id.clone(),
        };
        let _ = core.hooks.execute(&ctx).await;
    }

    core.history.lock().push(Message::user(prompt));

    let outcome = drive_loop(core, sink, &cancel, task_ok).await;

    let final_message = last_assistant_text(core);
    let stop_ctx = HookContext::Stop {
        session_id: core.id.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        result_subtype: outcome.subtype().to_owned(),
        final_message,
    };
    let _ = core.hooks.execute(&stop_ctx).await;

    if let Err(e) = core.persist() {
        warn!(session_id = %core.id, error = %e, "failed to persist session");
    }

    info!(
        session_id = %core.id,
        subtype = outcome.subtype(),
        turns = core.budget.lock().turns_used(),
        "query finished"
    );
    sink.result_final(outcome.clone()).await;
    outcome
}

/// The turn loop proper.
#[allow(clippy::too_many_lines, clippy::cast_possible_truncation)]
async fn drive_loop(
    core: &Arc<SessionCore>,
    sink: &EventSink,
    cancel: &CancellationToken,
    task_ok: bool,
) -> ResultOutcome {
    loop {
        // Budget limits are checked before the next model call; a turn
        // already in flight always finishes.
        let pre_check = core.budget.lock().check_before_model_call();
        if let Some(stop) = pre_check {
            let budget = core.budget.lock();
            return match stop {
                BudgetStop::MaxTurns => ResultOutcome::ErrorMaxTurns {
                    num_turns: budget.turns_used(),
                    total_cost_usd: budget.cost_accrued(),
                },
                BudgetStop::MaxBudget => ResultOutcome::ErrorMaxBudget {
                    total_cost_usd: budget.cost_accrued(),
                    max_budget_usd: budget.limits().max_budget_usd.unwrap_or_default(),
                },
            };
        }

        if cancel.is_cancelled() {
            return interrupted_outcome(core);
        }

        let request = build_request(core, task_ok);
        let turn = match core.provider.complete(&request).await {
            Ok(turn) => turn,
            Err(e) => {
                error!(session_id = %core.id, category = e.category(), error = %e, "model fault");
                let budget = core.budget.lock();
                return ResultOutcome::ErrorDuringExecution {
                    errors: vec![format!("model fault: {e}")],
                    num_turns: budget.turns_used(),
                    total_cost_usd: budget.cost_accrued(),
                };
            }
        };

        let cost = pricing::calculate_cost(core.provider.model(), &turn.usage).total;
        core.budget.lock().record_turn(cost);
        debug!(
            session_id = %core.id,
            turn = core.budget.lock().turns_used(),
            cost,
            stop_reason = ?turn.stop_reason,
            "turn completed"
        );

        core.history.lock().push(turn.clone().into_message());
        for block in &turn.content {
            match block {
                AssistantContent::Text { text } => sink.assistant_text(text).await,
                AssistantContent::ToolUse { .. } => {
                    if let Some(call) = block.as_tool_call() {
                        sink.assistant_tool_call(call).await;
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            return interrupted_outcome(core);
        }

        let calls = turn.tool_calls();
        if calls.is_empty() {
            if turn.stop_reason == StopReason::EndTurn {
                match conclude(core, &turn) {
                    Conclusion::Finished(outcome) => return outcome,
                    Conclusion::RetryStructured(correction) => {
                        core.history.lock().push(Message::user(correction));
                        continue;
                    }
                }
            }
            // The model stopped without end_turn (max tokens, stop
            // sequence); re-prompt within the remaining budget.
            continue;
        }

        let stages = PolicyStages {
            session_id: &core.id,
            registry: &core.registry,
            sandbox: &core.sandbox,
            gate: core.gate.as_deref(),
            permission_mode: core.options.permission_mode,
            hooks: &core.hooks,
            task_available: task_ok,
        };

        let mut interrupted = false;
        for call in &calls {
            // An interrupt observed here guarantees no further tool
            // execution starts; the one in flight already finished.
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            let started = Instant::now();
            let decision = pipeline::decide(&stages, call).await;

            let (content, is_error) = match &decision.decision {
                PolicyDecision::Deny { message } => {
                    // No side effects on deny; the reason is fed back to
                    // the model as an error tool result.
                    (message.clone(), true)
                }
                PolicyDecision::Allow { .. } => {
                    let output = execute_allowed(core, call, &decision.effective_input, cancel, task_ok).await;
                    let is_error = output.is_error();
                    let content = match &decision.additional_context {
                        Some(context) => format!("{}\n\n{context}", output.content),
                        None => output.content,
                    };
                    let duration_ms = started.elapsed().as_millis() as u64;
                    pipeline::fire_post_hooks(&stages, call, &content, is_error, duration_ms)
                        .await;
                    (content, is_error)
                }
            };

            core.history
                .lock()
                .push(Message::tool_result(&call.id, &content, is_error));
            sink.tool_result(&call.id, &content, is_error).await;
        }

        if interrupted || cancel.is_cancelled() {
            return interrupted_outcome(core);
        }
    }
}

/// How a no-tool-call `end_turn` resolves.
enum Conclusion {
    Finished(ResultOutcome),
    RetryStructured(String),
}

/// Resolve a final turn: validate structured output when configured.
fn conclude(core: &Arc<SessionCore>, turn: &ModelTurn) -> Conclusion {
    let text = turn.text_content();
    let budget_snapshot = |core: &Arc<SessionCore>| {
        let budget = core.budget.lock();
        (budget.turns_used(), budget.cost_accrued())
    };

    if let Some(schema) = &core.options.output_schema {
        match crate::structured::parse_and_validate(schema, &text) {
            Ok(payload) => {
                let (num_turns, total_cost_usd) = budget_snapshot(core);
                Conclusion::Finished(ResultOutcome::Success {
                    result: text,
                    structured_output: Some(payload),
                    num_turns,
                    total_cost_usd,
                })
            }
            Err(errors) => {
                warn!(session_id = %core.id, ?errors, "structured output validation failed");
                let limit_reached = core.budget.lock().record_structured_failure();
                if limit_reached {
                    let budget = core.budget.lock();
                    Conclusion::Finished(ResultOutcome::ErrorMaxStructuredOutputRetries {
                        retries: budget.structured_retries(),
                        total_cost_usd: budget.cost_accrued(),
                    })
                } else {
                    Conclusion::RetryStructured(format!(
                        "The final response did not satisfy the required output schema:\n{}\n\
                         Respond again with only a JSON document matching the schema.",
                        errors.join("\n")
                    ))
                }
            }
        }
    } else {
        let (num_turns, total_cost_usd) = budget_snapshot(core);
        Conclusion::Finished(ResultOutcome::Success {
            result: text,
            structured_output: None,
            num_turns,
            total_cost_usd,
        })
    }
}

/// Execute an allowed call: delegation through the dispatcher, everything
/// else through the registry.
async fn execute_allowed(
    core: &Arc<SessionCore>,
    call: &keel_core::messages::ToolCall,
    effective_input: &serde_json::Value,
    cancel: &CancellationToken,
    task_ok: bool,
) -> ToolOutput {
    if call.name == TASK_TOOL && task_ok {
        return dispatcher::dispatch(core, effective_input).await;
    }

    let Some(tool) = core.registry.get(&call.name) else {
        return error_output(format!("tool not found: {}", call.name));
    };

    if cancel.is_cancelled() {
        return error_output("operation cancelled");
    }

    let ctx = ToolContext {
        tool_call_id: call.id.clone(),
        session_id: core.id.clone(),
        working_directory: core
            .options
            .working_directory
            .clone()
            .unwrap_or_else(|| ".".to_owned()),
        cancellation: cancel.clone(),
    };

    match tool.execute(effective_input.clone(), &ctx).await {
        Ok(output) => output,
        Err(e) => error_output(e.to_string()),
    }
}

/// The terminal outcome for an interrupted query.
fn interrupted_outcome(core: &Arc<SessionCore>) -> ResultOutcome {
    let budget = core.budget.lock();
    ResultOutcome::ErrorDuringExecution {
        errors: vec!["query interrupted".to_owned()],
        num_turns: budget.turns_used(),
        total_cost_usd: budget.cost_accrued(),
    }
}

/// Most recent assistant text in history, for the Stop hook.
fn last_assistant_text(core: &Arc<SessionCore>) -> Option<String> {
    core.history.lock().iter().rev().find_map(|message| {
        if let Message::Assistant { .. } = message {
            let text = message.text();
            if text.is_empty() { None } else { Some(text) }
        } else {
            None
        }
    })
}

/// Build the model request from session state.
fn build_request(core: &Arc<SessionCore>, task_ok: bool) -> ModelRequest {
    let mut tools = core.registry.definitions();
    if task_ok {
        tools.push(dispatcher::task_definition(&core.options.agents));
    }
    ModelRequest {
        system_prompt: core.options.system_prompt.clone(),
        messages: core.history.lock().clone(),
        tools,
        output_schema: core.options.output_schema.clone(),
    }
}
