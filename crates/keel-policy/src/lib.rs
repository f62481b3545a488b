//! # keel-policy
//!
//! Policy primitives for tool-call approval: the sandbox layer and the
//! permission gate.
//!
//! For every tool call the runtime produces exactly one [`PolicyDecision`],
//! evaluated in a fixed order: sandbox rules first, then the permission
//! gate (a caller-supplied callback or the configured mode default), then
//! `PreToolUse` hooks. This crate owns the first two stages; hook
//! evaluation lives in `keel-hooks` and the composition in `keel-runtime`.

#![deny(unsafe_code)]

pub mod gate;
pub mod sandbox;
pub mod types;

pub use gate::{GateContext, PermissionGate, mode_default_decision};
pub use sandbox::{NetworkSettings, SandboxPolicy, SandboxSettings, SandboxVerdict};
pub use types::{PermissionMode, PolicyDecision};
