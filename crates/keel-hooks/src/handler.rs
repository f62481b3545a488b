//! Hook handler trait.
//!
//! Defines the [`HookHandler`] trait that all hook implementations must
//! satisfy. Handlers are registered with the
//! [`HookRegistry`](crate::registry::HookRegistry) and executed by the
//! [`HookEngine`](crate::engine::HookEngine).

use async_trait::async_trait;

use crate::errors::HookError;
use crate::types::{HookContext, HookEvent, HookOutcome};

/// A lifecycle hook handler.
///
/// Implementations are registered in the hook registry and executed at the
/// matching lifecycle event, in registration order. Handlers inspect the
/// context and return a [`HookOutcome`] contributing a permission override,
/// additional context, an input rewrite, or nothing.
///
/// # Matcher
///
/// [`matcher`](HookHandler::matcher) is a regex pattern matched against the
/// tool name for tool-scoped events. `None` means match-all. Matchers are
/// ignored for lifecycle events.
///
/// # Faults
///
/// An error from [`handle`](HookHandler::handle) is treated as a deny for
/// `PreToolUse` (fail-closed) and as a logged no-op for every other event
/// (fail-open).
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Unique name for this handler (used in logs and deny reasons).
    fn name(&self) -> &str;

    /// Which lifecycle event this handler responds to.
    fn event(&self) -> HookEvent;

    /// Regex pattern matched against tool names. `None` = match-all.
    fn matcher(&self) -> Option<&str> {
        None
    }

    /// Optional timeout in milliseconds. Defaults to the engine's timeout.
    fn timeout_ms(&self) -> Option<u64> {
        None
    }

    /// Execute the handler with the given context.
    async fn handle(&self, context: &HookContext) -> Result<HookOutcome, HookError>;
}
