//! # keel-hooks
//!
//! Lifecycle hooks for the Keel runtime: externally supplied observers and
//! interceptors invoked at named lifecycle events, optionally scoped to a
//! tool-name pattern.
//!
//! Hooks run in **registration order**. For `PreToolUse`, the first deny
//! wins and short-circuits the chain; additional context from multiple
//! hooks is concatenated and input rewrites are merged. Hook faults are
//! fail-closed for `PreToolUse` and fail-open (logged) everywhere else.

#![deny(unsafe_code)]

pub mod engine;
pub mod errors;
pub mod handler;
pub mod registry;
pub mod types;

pub use engine::HookEngine;
pub use errors::HookError;
pub use handler::HookHandler;
pub use registry::HookRegistry;
pub use types::{HookContext, HookEvent, HookOutcome, PermissionOverride};
