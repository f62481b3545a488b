//! # keel-tools
//!
//! The tool system for the Keel runtime: the [`AgentTool`] trait every
//! tool implements, the [`ToolRegistry`] the runtime dispatches through,
//! and in-process [`ToolServer`] bundles exposed under the
//! `server__toolname` addressing scheme.
//!
//! Registration happens before any session starts; registries are then
//! shared read-only across sessions.

#![deny(unsafe_code)]

pub mod errors;
pub mod registry;
pub mod server;
pub mod traits;

pub use errors::ToolError;
pub use registry::ToolRegistry;
pub use server::ToolServer;
pub use traits::{AgentTool, ToolContext};
