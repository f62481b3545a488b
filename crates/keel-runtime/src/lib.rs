//! # keel-runtime
//!
//! The Keel agent session runtime: a stateful loop that turns a
//! natural-language request into a sequence of model turns and tool
//! invocations, while enforcing budget limits, permission policy,
//! sandboxing, hook interception, structured-output validation, and
//! delegation to named sub-agents.
//!
//! Entry point is [`AgentRuntime`]: register tools, hooks, and a gate,
//! then create or resume sessions and drive queries through their event
//! streams.

#![deny(unsafe_code)]

pub mod budget;
pub mod errors;
pub mod runtime;
pub mod session;
pub mod stream;
pub mod structured;

mod agent;
mod dispatcher;
mod pipeline;

pub use errors::RuntimeError;
pub use runtime::{AgentRuntime, AgentRuntimeBuilder};
pub use session::{AgentSession, SessionStatus};
pub use stream::EventStream;
