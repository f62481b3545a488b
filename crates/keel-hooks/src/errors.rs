//! Hook error types.

/// Errors raised by hook handlers or the registry.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// A handler failed while processing a context.
    #[error("hook '{name}' failed: {message}")]
    HandlerFailed {
        /// Handler name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// A matcher pattern did not compile as a regex.
    #[error("invalid matcher pattern '{pattern}': {message}")]
    InvalidMatcher {
        /// The offending pattern.
        pattern: String,
        /// Regex error description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_failed_display() {
        let err = HookError::HandlerFailed {
            name: "audit".into(),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "hook 'audit' failed: boom");
    }

    #[test]
    fn invalid_matcher_display() {
        let err = HookError::InvalidMatcher {
            pattern: "(".into(),
            message: "unclosed group".into(),
        };
        assert!(err.to_string().contains("invalid matcher pattern"));
    }
}
