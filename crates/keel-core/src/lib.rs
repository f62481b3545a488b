//! # keel-core
//!
//! Foundation types for the Keel agent session runtime.
//!
//! This crate provides the shared vocabulary that all other Keel crates
//! depend on:
//!
//! - **Branded IDs**: `SessionId`, `ToolCallId`, `EventId` as newtypes
//! - **Messages**: `Message` enum with `User`, `Assistant`, `ToolResult` variants
//! - **Tool schema**: `ToolDefinition` sent to the model, `ToolOutput` returned
//! - **Events**: `AgentEvent` — the typed stream a session emits to its caller
//! - **Results**: `ResultOutcome` — the terminal classification of a query

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod messages;
pub mod tools;
