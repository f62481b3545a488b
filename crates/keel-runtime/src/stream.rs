//! The message stream.
//!
//! An append-only, ordered, single-consumer sequence of [`AgentEvent`]s
//! over a *bounded* channel. The producing session awaits when the
//! consumer lags — the runtime never buffers unconsumed events without
//! bound. A consumer that drops its [`EventStream`] early stops delivery
//! without affecting runtime state.

use tokio::sync::mpsc;
use tracing::trace;

use keel_core::events::{AgentEvent, BaseEvent, ResultOutcome};
use keel_core::messages::ToolCall;

/// Consumer half of a session's event stream.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<AgentEvent>,
}

impl EventStream {
    /// Receive the next event, or `None` once the query has closed.
    pub async fn next(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }

    /// Drain the stream to completion, returning every event in order.
    ///
    /// The final element is the query's `ResultFinal` event.
    pub async fn collect(mut self) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }

    /// Drain until the terminal event and return its outcome.
    pub async fn final_outcome(mut self) -> Option<ResultOutcome> {
        while let Some(event) = self.next().await {
            if let AgentEvent::ResultFinal { outcome, .. } = event {
                return Some(outcome);
            }
        }
        None
    }
}

/// Producer half: emits typed events into the bounded channel.
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: Option<mpsc::Sender<AgentEvent>>,
    session_id: String,
}

impl EventSink {
    /// Create a bounded sink/stream pair for a query.
    pub(crate) fn channel(session_id: &str, capacity: usize) -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx: Some(tx),
                session_id: session_id.to_owned(),
            },
            EventStream { rx },
        )
    }

    /// A sink that discards everything (nested sessions run by the
    /// dispatcher, which surfaces only the terminal result).
    pub(crate) fn null(session_id: &str) -> Self {
        Self {
            tx: None,
            session_id: session_id.to_owned(),
        }
    }

    /// Emit an event, awaiting channel capacity.
    ///
    /// A dropped consumer is not an error: delivery stops, the query
    /// continues.
    pub(crate) async fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.tx {
            trace!(session_id = %self.session_id, "emitting event");
            let _ = tx.send(event).await;
        }
    }

    pub(crate) async fn init(&self, model: &str, tools: Vec<String>, permission_mode: String) {
        self.emit(AgentEvent::Init {
            base: BaseEvent::now(&self.session_id),
            model: model.to_owned(),
            tools,
            permission_mode,
        })
        .await;
    }

    pub(crate) async fn assistant_text(&self, text: &str) {
        self.emit(AgentEvent::AssistantText {
            base: BaseEvent::now(&self.session_id),
            text: text.to_owned(),
        })
        .await;
    }

    pub(crate) async fn assistant_tool_call(&self, tool_call: ToolCall) {
        self.emit(AgentEvent::AssistantToolCall {
            base: BaseEvent::now(&self.session_id),
            tool_call,
        })
        .await;
    }

    pub(crate) async fn tool_result(&self, tool_call_id: &str, content: &str, is_error: bool) {
        self.emit(AgentEvent::ToolResult {
            base: BaseEvent::now(&self.session_id),
            tool_call_id: tool_call_id.to_owned(),
            content: content.to_owned(),
            is_error,
        })
        .await;
    }

    pub(crate) async fn result_final(&self, outcome: ResultOutcome) {
        self.emit(AgentEvent::ResultFinal {
            base: BaseEvent::now(&self.session_id),
            outcome,
        })
        .await;
    }
}
