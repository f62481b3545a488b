//! Store error types.

/// Errors surfaced by a [`SessionStore`](crate::store::SessionStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record exists for the given session ID.
    #[error("session not found: {0}")]
    NotFound(String),

    /// Backend-specific failure (I/O, serialization, corruption).
    #[error("storage error: {0}")]
    Storage(String),
}
