//! Runtime error types.

use keel_hooks::HookError;
use keel_model::ModelError;
use keel_store::StoreError;

/// Errors that can occur during agent runtime execution.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Model collaborator error.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Tool execution error.
    #[error("tool error: {tool_name}: {message}")]
    Tool {
        /// Tool name.
        tool_name: String,
        /// Error description.
        message: String,
    },

    /// Hook registration or execution error.
    #[error("hook error: {0}")]
    Hook(#[from] HookError),

    /// Session store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The session was terminated and rejects further queries.
    #[error("session closed: {0}")]
    SessionClosed(String),

    /// Another query is already running on the session.
    #[error("session busy: {0}")]
    SessionBusy(String),

    /// No persisted session exists for the given ID.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The operation is not valid in the session's current state.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// No agent profile is registered under the given name.
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// Operation was cancelled via interrupt.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal / unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether the error is recoverable (the caller can retry).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Model(e) => e.is_retryable(),
            Self::Cancelled | Self::SessionBusy(_) => true,
            Self::Tool { .. }
            | Self::Hook(_)
            | Self::Store(_)
            | Self::SessionClosed(_)
            | Self::SessionNotFound(_)
            | Self::InvalidState(_)
            | Self::UnknownAgent(_)
            | Self::Internal(_) => false,
        }
    }

    /// Error category string for event emission and audit.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Model(_) => "model",
            Self::Tool { .. } => "tool",
            Self::Hook(_) => "hook",
            Self::Store(_) => "store",
            Self::SessionClosed(_) => "session_closed",
            Self::SessionBusy(_) => "session_busy",
            Self::SessionNotFound(_) => "session_not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::UnknownAgent(_) => "unknown_agent",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}
