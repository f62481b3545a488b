//! The model provider trait.
//!
//! Every backend implements [`ModelProvider`] to expose a unified
//! one-turn completion interface. The runtime calls it once per turn and
//! treats failures per the [`ModelError`] taxonomy.

use async_trait::async_trait;

use crate::types::{ModelRequest, ModelTurn};

/// Errors that can occur during a model call.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Authentication failed (expired token, invalid key).
    #[error("auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the backend.
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// The backend returned an API error.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// The response could not be interpreted as a turn.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// Error description.
        message: String,
    },

    /// The call was cancelled.
    #[error("model call cancelled")]
    Cancelled,

    /// Backend-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ModelError {
    /// Whether this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::Auth { .. }
            | Self::InvalidResponse { .. }
            | Self::Cancelled
            | Self::Other { .. } => false,
        }
    }

    /// Error category string for event emission and audit.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { .. } => "api",
            Self::InvalidResponse { .. } => "parse",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

/// The model collaborator.
///
/// Implementors must be `Send + Sync` for use across async tasks. The
/// runtime holds one provider per session and issues exactly one
/// [`complete`](ModelProvider::complete) call per turn.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Current model ID.
    fn model(&self) -> &str;

    /// Produce one turn for the given request.
    async fn complete(&self, request: &ModelRequest) -> Result<ModelTurn, ModelError>;
}

/// Factory for creating providers on demand.
///
/// Called when a session (or a delegated sub-agent with a model override)
/// is created, so model switches take effect at session boundaries.
pub trait ModelProviderFactory: Send + Sync {
    /// Create a provider for the given model ID.
    fn create_for_model(
        &self,
        model: &str,
    ) -> Result<std::sync::Arc<dyn ModelProvider>, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use keel_core::messages::StopReason;

    struct FixedProvider;

    #[async_trait]
    impl ModelProvider for FixedProvider {
        fn model(&self) -> &str {
            "test-model"
        }
        async fn complete(&self, _request: &ModelRequest) -> Result<ModelTurn, ModelError> {
            Ok(ModelTurn::text("fixed", StopReason::EndTurn))
        }
    }

    #[tokio::test]
    async fn provider_completes_a_turn() {
        let provider = FixedProvider;
        let turn = provider.complete(&ModelRequest::default()).await.unwrap();
        assert_eq!(turn.text_content(), "fixed");
        assert_eq!(provider.model(), "test-model");
    }

    #[test]
    fn rate_limited_is_retryable() {
        let err = ModelError::RateLimited {
            retry_after_ms: 5000,
            message: "too many requests".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "rate_limit");
    }

    #[test]
    fn api_error_respects_retryable_flag() {
        let retryable = ModelError::Api {
            status: 500,
            message: "server error".into(),
            retryable: true,
        };
        assert!(retryable.is_retryable());

        let terminal = ModelError::Api {
            status: 400,
            message: "bad request".into(),
            retryable: false,
        };
        assert!(!terminal.is_retryable());
        assert_eq!(terminal.category(), "api");
    }

    #[test]
    fn auth_and_cancelled_not_retryable() {
        assert!(!ModelError::Auth { message: "expired".into() }.is_retryable());
        assert!(!ModelError::Cancelled.is_retryable());
        assert_eq!(ModelError::Cancelled.category(), "cancelled");
    }

    #[test]
    fn error_display() {
        let err = ModelError::Api {
            status: 429,
            message: "rate limited".into(),
            retryable: true,
        };
        assert_eq!(err.to_string(), "api error (429): rate limited");
        assert_matches!(err, ModelError::Api { status: 429, .. });
    }

    #[test]
    fn provider_is_object_safe() {
        fn assert_object_safe(_: &dyn ModelProvider) {}
        let _ = assert_object_safe;
    }

    #[test]
    fn factory_is_object_safe() {
        fn assert_object_safe(_: &dyn ModelProviderFactory) {}
        let _ = assert_object_safe;
    }
}
