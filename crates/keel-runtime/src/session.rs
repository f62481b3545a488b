//! Session state machine.
//!
//! A session owns its conversation history, identity, and budget counters
//! exclusively. States: `Created` → `Active` on the first query;
//! `Active` → `Interrupted` via [`AgentSession::interrupt`] (the in-flight
//! turn is cancelled, no further tool execution starts); `Interrupted` →
//! `Active` on the next query, appending to the same history; any state →
//! `Terminated` via [`AgentSession::close`], after which queries are
//! rejected with a "session closed" error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use keel_core::messages::Message;
use keel_hooks::{HookContext, HookEngine};
use keel_model::{ModelProvider, ModelProviderFactory};
use keel_policy::{PermissionGate, SandboxPolicy};
use keel_settings::SessionOptions;
use keel_store::{SessionRecord, SessionStore};
use keel_tools::ToolRegistry;

use crate::agent;
use crate::budget::BudgetController;
use crate::errors::RuntimeError;
use crate::stream::{EventSink, EventStream};

/// Session lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Constructed, no query yet.
    Created,
    /// At least one query ran or is running.
    Active,
    /// An interrupt was delivered; the next query reactivates.
    Interrupted,
    /// Closed; rejects further queries.
    Terminated,
}

/// Mutable lifecycle state guarded by one lock.
struct LifecycleState {
    status: SessionStatus,
    cancel: CancellationToken,
    inflight: bool,
}

/// Everything a query driver needs, shared via `Arc`.
pub(crate) struct SessionCore {
    pub(crate) id: String,
    pub(crate) created_at: String,
    pub(crate) parent_session_id: Option<String>,
    pub(crate) forked: bool,
    pub(crate) options: SessionOptions,
    pub(crate) registry: ToolRegistry,
    pub(crate) sandbox: SandboxPolicy,
    pub(crate) hooks: Arc<HookEngine>,
    pub(crate) gate: Option<Arc<dyn PermissionGate>>,
    pub(crate) provider: Arc<dyn ModelProvider>,
    pub(crate) factory: Arc<dyn ModelProviderFactory>,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) stream_capacity: usize,
    /// Fresh and forked sessions announce themselves with one Init event;
    /// plainly resumed sessions do not.
    pub(crate) emits_init: bool,
    init_emitted: AtomicBool,
    started: AtomicBool,
    state: Mutex<LifecycleState>,
    pub(crate) history: Mutex<Vec<Message>>,
    pub(crate) budget: Mutex<BudgetController>,
}

/// Parameters for building a [`SessionCore`].
pub(crate) struct SessionCoreParams {
    pub id: String,
    pub created_at: String,
    pub parent_session_id: Option<String>,
    pub forked: bool,
    pub options: SessionOptions,
    pub registry: ToolRegistry,
    pub hooks: Arc<HookEngine>,
    pub gate: Option<Arc<dyn PermissionGate>>,
    pub provider: Arc<dyn ModelProvider>,
    pub factory: Arc<dyn ModelProviderFactory>,
    pub store: Arc<dyn SessionStore>,
    pub stream_capacity: usize,
    pub emits_init: bool,
    pub history: Vec<Message>,
    pub budget: BudgetController,
}

impl SessionCore {
    pub(crate) fn new(params: SessionCoreParams) -> Self {
        let sandbox = SandboxPolicy::new(params.options.sandbox.clone());
        Self {
            id: params.id,
            created_at: params.created_at,
            parent_session_id: params.parent_session_id,
            forked: params.forked,
            options: params.options,
            registry: params.registry,
            sandbox,
            hooks: params.hooks,
            gate: params.gate,
            provider: params.provider,
            factory: params.factory,
            store: params.store,
            stream_capacity: params.stream_capacity,
            emits_init: params.emits_init,
            init_emitted: AtomicBool::new(false),
            started: AtomicBool::new(false),
            state: Mutex::new(LifecycleState {
                status: SessionStatus::Created,
                cancel: CancellationToken::new(),
                inflight: false,
            }),
            history: Mutex::new(params.history),
            budget: Mutex::new(params.budget),
        }
    }

    /// Current lifecycle status.
    pub(crate) fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    /// Transition into an active query; returns the query's cancellation
    /// token.
    pub(crate) fn begin_query(&self) -> Result<CancellationToken, RuntimeError> {
        let mut state = self.state.lock();
        match state.status {
            SessionStatus::Terminated => {
                return Err(RuntimeError::SessionClosed(self.id.clone()));
            }
            _ if state.inflight => {
                return Err(RuntimeError::SessionBusy(self.id.clone()));
            }
            SessionStatus::Created | SessionStatus::Active | SessionStatus::Interrupted => {}
        }
        state.status = SessionStatus::Active;
        state.inflight = true;
        state.cancel = CancellationToken::new();
        Ok(state.cancel.clone())
    }

    /// Mark the in-flight query finished. The session stays `Active`
    /// unless an interrupt or termination already moved it elsewhere.
    pub(crate) fn finish_query(&self) {
        let mut state = self.state.lock();
        state.inflight = false;
    }

    /// The current query's cancellation token.
    pub(crate) fn current_cancel(&self) -> CancellationToken {
        self.state.lock().cancel.clone()
    }

    /// Whether an Init event must still be emitted for this session.
    pub(crate) fn take_init_emission(&self) -> bool {
        self.emits_init && !self.init_emitted.swap(true, Ordering::SeqCst)
    }

    /// Whether the `SessionStart` lifecycle hook must still fire.
    pub(crate) fn take_session_start(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    /// Persist the session's current history and counters.
    pub(crate) fn persist(&self) -> Result<(), RuntimeError> {
        let record = SessionRecord {
            id: self.id.clone(),
            parent_session_id: self.parent_session_id.clone(),
            forked: self.forked,
            history: self.history.lock().clone(),
            turns_used: self.budget.lock().turns_used(),
            total_cost_usd: self.budget.lock().cost_accrued(),
            created_at: self.created_at.clone(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };
        self.store.put(&record)?;
        Ok(())
    }
}

/// A live agent session.
///
/// Cheap to clone the handle (`Arc` inside); all mutation is internal.
pub struct AgentSession {
    core: Arc<SessionCore>,
}

impl AgentSession {
    pub(crate) fn from_core(core: Arc<SessionCore>) -> Self {
        Self { core }
    }

    /// The session's identity.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.core.id
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.core.status()
    }

    /// Turns consumed over the session's lifetime.
    #[must_use]
    pub fn turns_used(&self) -> u32 {
        self.core.budget.lock().turns_used()
    }

    /// Cost accrued over the session's lifetime, in USD.
    #[must_use]
    pub fn total_cost_usd(&self) -> f64 {
        self.core.budget.lock().cost_accrued()
    }

    /// Number of messages in the session history.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.core.history.lock().len()
    }

    /// Snapshot of the session history.
    #[must_use]
    pub fn history(&self) -> Vec<Message> {
        self.core.history.lock().clone()
    }

    /// Submit a prompt and stream the resulting events.
    ///
    /// The query runs on a background task; one in-flight query per
    /// session. Returns the single-consumer event stream for this query —
    /// it closes after the terminal `ResultFinal` event.
    pub fn query(&self, prompt: impl Into<String>) -> Result<EventStream, RuntimeError> {
        let prompt = prompt.into();
        let _cancel = self.core.begin_query()?;
        let (sink, stream) = EventSink::channel(&self.core.id, self.core.stream_capacity);

        let core = Arc::clone(&self.core);
        debug!(session_id = %core.id, "query started");
        let _handle = tokio::spawn(async move {
            let _ = agent::run_query(&core, prompt, &sink).await;
            core.finish_query();
        });

        Ok(stream)
    }

    /// Request cancellation of the in-flight turn.
    ///
    /// Only valid from `Active`. The currently-executing tool call may
    /// finish if it cannot be cancelled safely, but no further tool
    /// execution starts afterward. The next query reactivates the session,
    /// appending to the same history.
    pub fn interrupt(&self) -> Result<(), RuntimeError> {
        let mut state = self.core.state.lock();
        if state.status != SessionStatus::Active {
            return Err(RuntimeError::InvalidState(format!(
                "interrupt is only valid from active (session {} is {:?})",
                self.core.id, state.status
            )));
        }
        info!(session_id = %self.core.id, "interrupt requested");
        state.status = SessionStatus::Interrupted;
        state.cancel.cancel();
        Ok(())
    }

    /// Terminate the session.
    ///
    /// Cancels any in-flight work, fires the `SessionEnd` lifecycle hook,
    /// persists the final state, and rejects all further queries.
    pub async fn close(&self) -> Result<(), RuntimeError> {
        {
            let mut state = self.core.state.lock();
            if state.status == SessionStatus::Terminated {
                return Ok(());
            }
            state.status = SessionStatus::Terminated;
            state.cancel.cancel();
        }

        let message_count = self.core.history.lock().len() as u64;
        let ctx = HookContext::SessionEnd {
            session_id: self.core.id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            message_count,
        };
        let _ = self.core.hooks.execute(&ctx).await;

        self.core.persist()?;
        info!(session_id = %self.core.id, "session closed");
        Ok(())
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("id", &self.core.id)
            .field("status", &self.status())
            .finish()
    }
}
