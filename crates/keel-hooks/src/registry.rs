//! Hook registry.
//!
//! Maintains a registration-ordered collection of [`HookHandler`] instances
//! per [`HookEvent`]. Registration order is the evaluation order — the
//! registry is the source of truth for which hooks are active and what
//! order they run in.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::errors::HookError;
use crate::handler::HookHandler;
use crate::types::HookEvent;

/// A registered handler with its compiled matcher.
#[derive(Clone)]
pub struct RegisteredHook {
    /// The handler.
    pub handler: Arc<dyn HookHandler>,
    /// Compiled matcher pattern, if the handler declares one.
    matcher: Option<Regex>,
}

impl RegisteredHook {
    /// Whether this hook applies to the given tool name for the event.
    ///
    /// Matchers are ignored for lifecycle events; absent matchers match all.
    #[must_use]
    pub fn matches(&self, event: HookEvent, tool_name: Option<&str>) -> bool {
        if !event.is_tool_scoped() {
            return true;
        }
        match (&self.matcher, tool_name) {
            (None, _) => true,
            (Some(re), Some(name)) => re.is_match(name),
            (Some(_), None) => false,
        }
    }
}

/// Registry of lifecycle hook handlers, evaluated in registration order.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<HookEvent, Vec<RegisteredHook>>,
}

impl HookRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// Register a hook handler, compiling its matcher pattern.
    ///
    /// Handlers for the same event run in the order they were registered.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::InvalidMatcher`] if the pattern is not a valid
    /// regex.
    pub fn register(&mut self, handler: Arc<dyn HookHandler>) -> Result<(), HookError> {
        let matcher = match handler.matcher() {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| HookError::InvalidMatcher {
                pattern: pattern.to_owned(),
                message: e.to_string(),
            })?),
            None => None,
        };

        debug!(
            name = %handler.name(),
            event = %handler.event(),
            matcher = handler.matcher().unwrap_or("<all>"),
            "registering hook"
        );

        self.hooks
            .entry(handler.event())
            .or_default()
            .push(RegisteredHook { handler, matcher });
        Ok(())
    }

    /// Handlers applicable to the event and tool name, in registration order.
    #[must_use]
    pub fn handlers_for(&self, event: HookEvent, tool_name: Option<&str>) -> Vec<RegisteredHook> {
        self.hooks
            .get(&event)
            .map(|hooks| {
                hooks
                    .iter()
                    .filter(|h| h.matches(event, tool_name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of registered handlers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// Whether any handler is registered for the event.
    #[must_use]
    pub fn has_handlers(&self, event: HookEvent) -> bool {
        self.hooks.get(&event).is_some_and(|h| !h.is_empty())
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hook_count", &self.count())
            .finish()
    }
}
