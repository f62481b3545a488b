//! Runtime entry point.
//!
//! [`AgentRuntimeBuilder`] collects tools, tool servers, hooks, the
//! permission gate, the model provider factory, and the session store —
//! registration happens strictly before any session starts. The built
//! [`AgentRuntime`] then creates, resumes, and forks sessions; the tool
//! registry and profile tables are shared read-only across all of them.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, instrument};

use keel_core::ids::SessionId;
use keel_hooks::{HookEngine, HookHandler, HookRegistry};
use keel_model::ModelProviderFactory;
use keel_policy::PermissionGate;
use keel_settings::{RuntimeSettings, SessionOptions};
use keel_store::{SessionRecord, SessionStore};
use keel_tools::{AgentTool, ToolRegistry, ToolServer};

use crate::budget::{BudgetController, BudgetLimits};
use crate::errors::RuntimeError;
use crate::session::{AgentSession, SessionCore, SessionCoreParams};

/// Builder for [`AgentRuntime`].
pub struct AgentRuntimeBuilder {
    registry: ToolRegistry,
    hook_registry: HookRegistry,
    gate: Option<Arc<dyn PermissionGate>>,
    factory: Arc<dyn ModelProviderFactory>,
    store: Arc<dyn SessionStore>,
    settings: RuntimeSettings,
}

impl AgentRuntimeBuilder {
    /// Register a built-in tool.
    #[must_use]
    pub fn tool(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.registry.register(tool);
        self
    }

    /// Register an in-process tool server (tools addressed as
    /// `server__toolname`).
    #[must_use]
    pub fn server(mut self, server: &ToolServer) -> Self {
        self.registry.register_server(server);
        self
    }

    /// Register a hook handler. Hooks for the same event run in
    /// registration order.
    pub fn hook(mut self, handler: Arc<dyn HookHandler>) -> Result<Self, RuntimeError> {
        self.hook_registry.register(handler)?;
        Ok(self)
    }

    /// Install the permission gate callback.
    #[must_use]
    pub fn gate(mut self, gate: Arc<dyn PermissionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Override the runtime settings.
    #[must_use]
    pub fn settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Finish registration and build the runtime.
    #[must_use]
    pub fn build(self) -> AgentRuntime {
        AgentRuntime {
            registry: self.registry,
            hooks: Arc::new(HookEngine::new(self.hook_registry)),
            gate: self.gate,
            factory: self.factory,
            store: self.store,
            settings: self.settings,
            sessions: DashMap::new(),
        }
    }
}

/// The agent session runtime.
pub struct AgentRuntime {
    registry: ToolRegistry,
    hooks: Arc<HookEngine>,
    gate: Option<Arc<dyn PermissionGate>>,
    factory: Arc<dyn ModelProviderFactory>,
    store: Arc<dyn SessionStore>,
    settings: RuntimeSettings,
    sessions: DashMap<String, Arc<SessionCore>>,
}

impl AgentRuntime {
    /// Start building a runtime around a provider factory and a session
    /// store.
    #[must_use]
    pub fn builder(
        factory: Arc<dyn ModelProviderFactory>,
        store: Arc<dyn SessionStore>,
    ) -> AgentRuntimeBuilder {
        AgentRuntimeBuilder {
            registry: ToolRegistry::new(),
            hook_registry: HookRegistry::new(),
            gate: None,
            factory,
            store,
            settings: RuntimeSettings::default(),
        }
    }

    /// Create a fresh session.
    #[instrument(skip_all, fields(model = %options.model))]
    pub fn create_session(&self, options: SessionOptions) -> Result<AgentSession, RuntimeError> {
        let id = SessionId::new().into_inner();
        let created_at = chrono::Utc::now().to_rfc3339();

        self.store.put(&SessionRecord {
            id: id.clone(),
            parent_session_id: None,
            forked: false,
            history: Vec::new(),
            turns_used: 0,
            total_cost_usd: 0.0,
            created_at: created_at.clone(),
            updated_at: created_at.clone(),
        })?;

        let budget = BudgetController::new(limits_of(&options));
        let core = self.build_core(id, created_at, None, false, options, Vec::new(), budget, true)?;
        Ok(self.track(core))
    }

    /// Resume a persisted session under its existing identity.
    ///
    /// History and budget counters are loaded as persisted — counters are
    /// never reset by resume.
    #[instrument(skip_all, fields(session_id = id))]
    pub fn resume_session(
        &self,
        id: &str,
        options: SessionOptions,
    ) -> Result<AgentSession, RuntimeError> {
        if let Some(existing) = self.sessions.get(id) {
            debug!(session_id = id, "session already live");
            return Ok(AgentSession::from_core(Arc::clone(existing.value())));
        }

        let record = self
            .store
            .get(id)?
            .ok_or_else(|| RuntimeError::SessionNotFound(id.to_owned()))?;

        let budget = BudgetController::with_counters(
            limits_of(&options),
            record.turns_used,
            record.total_cost_usd,
        );
        let core = self.build_core(
            record.id,
            record.created_at,
            record.parent_session_id,
            record.forked,
            options,
            record.history,
            budget,
            false,
        )?;
        Ok(self.track(core))
    }

    /// Fork a persisted session: copy its history under a new identity.
    ///
    /// The original session's persisted history is never mutated; the two
    /// sessions diverge independently from the fork point.
    #[instrument(skip_all, fields(source_session_id = id))]
    pub fn fork_session(
        &self,
        id: &str,
        options: SessionOptions,
    ) -> Result<AgentSession, RuntimeError> {
        let new_id = SessionId::new().into_inner();
        let record = self.store.copy(id, &new_id)?;

        let budget = BudgetController::with_counters(
            limits_of(&options),
            record.turns_used,
            record.total_cost_usd,
        );
        let core = self.build_core(
            record.id,
            record.created_at,
            record.parent_session_id,
            true,
            options,
            record.history,
            budget,
            true,
        )?;
        Ok(self.track(core))
    }

    /// Look up a live session by ID.
    #[must_use]
    pub fn get_session(&self, id: &str) -> Option<AgentSession> {
        self.sessions
            .get(id)
            .map(|core| AgentSession::from_core(Arc::clone(core.value())))
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The session store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    #[allow(clippy::too_many_arguments)]
    fn build_core(
        &self,
        id: String,
        created_at: String,
        parent_session_id: Option<String>,
        forked: bool,
        options: SessionOptions,
        history: Vec<keel_core::messages::Message>,
        budget: BudgetController,
        emits_init: bool,
    ) -> Result<Arc<SessionCore>, RuntimeError> {
        let model = if options.model.is_empty() {
            self.settings.agent.default_model.clone()
        } else {
            options.model.clone()
        };
        let provider = self.factory.create_for_model(&model)?;

        // The session's registry view applies the tool filters once; the
        // filtered view is what the model sees and what policy consults.
        let mut registry = match &options.allowed_tools {
            Some(allowed) => self.registry.scoped(allowed),
            None => self.registry.clone(),
        };
        if !options.disallowed_tools.is_empty() {
            registry = registry.without(&options.disallowed_tools);
        }

        Ok(Arc::new(SessionCore::new(SessionCoreParams {
            id,
            created_at,
            parent_session_id,
            forked,
            options,
            registry,
            hooks: Arc::clone(&self.hooks),
            gate: self.gate.clone(),
            provider,
            factory: Arc::clone(&self.factory),
            store: Arc::clone(&self.store),
            stream_capacity: self.settings.stream.event_buffer,
            emits_init,
            history,
            budget,
        })))
    }

    fn track(&self, core: Arc<SessionCore>) -> AgentSession {
        let _ = self.sessions.insert(core.id.clone(), Arc::clone(&core));
        AgentSession::from_core(core)
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("tools", &self.registry.len())
            .field("sessions", &self.session_count())
            .finish()
    }
}

fn limits_of(options: &SessionOptions) -> BudgetLimits {
    BudgetLimits {
        max_turns: options.max_turns,
        max_budget_usd: options.max_budget_usd,
        max_structured_output_retries: options.max_structured_output_retries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keel_core::messages::{Message, StopReason};
    use keel_model::{ModelError, ModelProvider, ModelRequest, ModelTurn};
    use keel_store::MemorySessionStore;

    struct EchoProvider {
        model: String,
    }

    #[async_trait]
    impl ModelProvider for EchoProvider {
        fn model(&self) -> &str {
            &self.model
        }
        async fn complete(&self, _request: &ModelRequest) -> Result<ModelTurn, ModelError> {
            Ok(ModelTurn::text("echo", StopReason::EndTurn))
        }
    }

    struct EchoFactory;

    impl ModelProviderFactory for EchoFactory {
        fn create_for_model(
            &self,
            model: &str,
        ) -> Result<Arc<dyn ModelProvider>, ModelError> {
            Ok(Arc::new(EchoProvider {
                model: model.to_owned(),
            }))
        }
    }

    fn make_runtime() -> AgentRuntime {
        AgentRuntime::builder(Arc::new(EchoFactory), Arc::new(MemorySessionStore::new())).build()
    }

    #[tokio::test]
    async fn create_session_persists_record() {
        let runtime = make_runtime();
        let session = runtime.create_session(SessionOptions::default()).unwrap();
        assert_eq!(runtime.session_count(), 1);
        let record = runtime.store().get(session.id()).unwrap().unwrap();
        assert!(record.history.is_empty());
        assert!(!record.forked);
    }

    #[tokio::test]
    async fn resume_unknown_session_errors() {
        let runtime = make_runtime();
        let err = runtime
            .resume_session("ghost", SessionOptions::default())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn resume_keeps_identity_and_counters() {
        let runtime = make_runtime();
        let mut record = SessionRecord::new("persisted");
        record.history.push(Message::user("earlier"));
        record.turns_used = 4;
        record.total_cost_usd = 0.2;
        runtime.store().put(&record).unwrap();

        let session = runtime
            .resume_session("persisted", SessionOptions::default())
            .unwrap();
        assert_eq!(session.id(), "persisted");
        assert_eq!(session.turns_used(), 4);
        assert!((session.total_cost_usd() - 0.2).abs() < 1e-9);
        assert_eq!(session.history_len(), 1);
    }

    #[tokio::test]
    async fn resume_live_session_returns_same_core() {
        let runtime = make_runtime();
        let session = runtime.create_session(SessionOptions::default()).unwrap();
        let again = runtime
            .resume_session(session.id(), SessionOptions::default())
            .unwrap();
        assert_eq!(session.id(), again.id());
        assert_eq!(runtime.session_count(), 1);
    }

    #[tokio::test]
    async fn fork_assigns_new_identity_and_copies_history() {
        let runtime = make_runtime();
        let mut record = SessionRecord::new("origin");
        record.history.push(Message::user("shared past"));
        runtime.store().put(&record).unwrap();

        let fork = runtime
            .fork_session("origin", SessionOptions::default())
            .unwrap();
        assert_ne!(fork.id(), "origin");
        assert_eq!(fork.history_len(), 1);

        let original = runtime.store().get("origin").unwrap().unwrap();
        assert_eq!(original.history.len(), 1);
        assert!(!original.forked);
        let forked = runtime.store().get(fork.id()).unwrap().unwrap();
        assert!(forked.forked);
        assert_eq!(forked.parent_session_id.as_deref(), Some("origin"));
    }

    #[tokio::test]
    async fn get_session_finds_live() {
        let runtime = make_runtime();
        let session = runtime.create_session(SessionOptions::default()).unwrap();
        assert!(runtime.get_session(session.id()).is_some());
        assert!(runtime.get_session("missing").is_none());
    }

    #[tokio::test]
    async fn empty_model_falls_back_to_default() {
        let runtime = make_runtime();
        let options = SessionOptions {
            model: String::new(),
            ..Default::default()
        };
        let session = runtime.create_session(options).unwrap();
        // The default model flows into the Init event's echo; reaching it
        // here via a query would need a consumer, so just check liveness.
        assert_eq!(session.status(), crate::session::SessionStatus::Created);
    }
}
