//! Message types for the Keel conversation model.
//!
//! Messages form the conversation history passed to the model on each turn.
//! Three roles: user, assistant, and tool result. History is append-only;
//! a message is immutable once added.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Tool call
// ─────────────────────────────────────────────────────────────────────────────

/// A tool call requested by the assistant.
///
/// The call `id` is unique within a session; the runtime produces exactly
/// one policy decision and at most one execution per id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique tool call ID.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Tool arguments (JSON object).
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a tool call with the given id, name, and arguments.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token and cost tracking
// ─────────────────────────────────────────────────────────────────────────────

/// Token usage information from a model response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Tokens read from prompt cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
}

impl TokenUsage {
    /// Accumulate another usage record into this one.
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        if let Some(cr) = other.cache_read_tokens {
            self.cache_read_tokens = Some(self.cache_read_tokens.unwrap_or(0) + cr);
        }
    }
}

/// Cost information in USD.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cost {
    /// Input cost.
    pub input_cost: f64,
    /// Output cost.
    pub output_cost: f64,
    /// Total cost.
    pub total: f64,
    /// Currency code (always `"USD"`).
    pub currency: String,
}

/// Reasons why the model stopped generating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of response.
    EndTurn,
    /// Model wants to use a tool.
    ToolUse,
    /// Hit the max output token limit.
    MaxTokens,
    /// Hit a stop sequence.
    StopSequence,
    /// Model refused to answer (safety).
    Refusal,
}

// ─────────────────────────────────────────────────────────────────────────────
// Message types
// ─────────────────────────────────────────────────────────────────────────────

/// A content block in an assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantContent {
    /// A text segment.
    Text {
        /// The text.
        text: String,
    },
    /// A tool use request.
    ToolUse {
        /// Tool call ID.
        id: String,
        /// Tool name.
        name: String,
        /// Tool input (JSON object).
        input: Map<String, Value>,
    },
}

impl AssistantContent {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a tool-use block from a [`ToolCall`].
    #[must_use]
    pub fn tool_use(call: &ToolCall) -> Self {
        Self::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.arguments.clone(),
        }
    }

    /// Extract a [`ToolCall`] if this block is a tool use.
    #[must_use]
    pub fn as_tool_call(&self) -> Option<ToolCall> {
        match self {
            Self::ToolUse { id, name, input } => Some(ToolCall {
                id: id.clone(),
                name: name.clone(),
                arguments: input.clone(),
            }),
            Self::Text { .. } => None,
        }
    }
}

/// A conversation message (discriminated by `role`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Message {
    /// User message.
    #[serde(rename = "user")]
    User {
        /// Message content.
        content: String,
    },
    /// Assistant message.
    #[serde(rename = "assistant")]
    Assistant {
        /// Content blocks.
        content: Vec<AssistantContent>,
        /// Token usage for the turn that produced this message.
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
        /// Stop reason reported by the model.
        #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
        stop_reason: Option<StopReason>,
    },
    /// Tool result message.
    #[serde(rename = "toolResult")]
    ToolResult {
        /// ID of the tool call this result answers.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Result content.
        content: String,
        /// Error flag.
        #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl Message {
    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create a text-only assistant message.
    #[must_use]
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: vec![AssistantContent::text(text)],
            usage: None,
            stop_reason: None,
        }
    }

    /// Create a tool result message.
    #[must_use]
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: if is_error { Some(true) } else { None },
        }
    }

    /// Tool calls in this message (empty for non-assistant messages).
    #[must_use]
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        match self {
            Self::Assistant { content, .. } => {
                content.iter().filter_map(AssistantContent::as_tool_call).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Concatenated text of this message's text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::User { content } => content.clone(),
            Self::Assistant { content, .. } => content
                .iter()
                .filter_map(|c| match c {
                    AssistantContent::Text { text } => Some(text.as_str()),
                    AssistantContent::ToolUse { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Self::ToolResult { content, .. } => content.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        let mut m = Map::new();
        for (k, v) in pairs {
            let _ = m.insert((*k).to_owned(), v.clone());
        }
        m
    }

    #[test]
    fn tool_call_construction() {
        let call = ToolCall::new("tc-1", "Bash", args(&[("command", json!("ls"))]));
        assert_eq!(call.id, "tc-1");
        assert_eq!(call.name, "Bash");
        assert_eq!(call.arguments["command"], "ls");
    }

    #[test]
    fn token_usage_accumulates() {
        let mut total = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
            cache_read_tokens: None,
        };
        total.accumulate(&TokenUsage {
            input_tokens: 30,
            output_tokens: 20,
            cache_read_tokens: Some(10),
        });
        assert_eq!(total.input_tokens, 130);
        assert_eq!(total.output_tokens, 70);
        assert_eq!(total.cache_read_tokens, Some(10));
    }

    #[test]
    fn stop_reason_serde_values() {
        assert_eq!(
            serde_json::to_string(&StopReason::EndTurn).unwrap(),
            "\"end_turn\""
        );
        assert_eq!(
            serde_json::to_string(&StopReason::ToolUse).unwrap(),
            "\"tool_use\""
        );
        assert_eq!(
            serde_json::to_string(&StopReason::MaxTokens).unwrap(),
            "\"max_tokens\""
        );
    }

    #[test]
    fn assistant_content_tool_use_roundtrip() {
        let call = ToolCall::new("tc-2", "Read", args(&[("file_path", json!("/tmp/x"))]));
        let block = AssistantContent::tool_use(&call);
        let back = block.as_tool_call().unwrap();
        assert_eq!(back, call);
    }

    #[test]
    fn assistant_content_text_has_no_tool_call() {
        assert!(AssistantContent::text("hi").as_tool_call().is_none());
    }

    #[test]
    fn message_user_serde_tag() {
        let msg = Message::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn message_assistant_serde_roundtrip() {
        let msg = Message::Assistant {
            content: vec![
                AssistantContent::text("thinking about it"),
                AssistantContent::ToolUse {
                    id: "tc-1".into(),
                    name: "Bash".into(),
                    input: args(&[("command", json!("pwd"))]),
                },
            ],
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
                cache_read_tokens: None,
            }),
            stop_reason: Some(StopReason::ToolUse),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn message_tool_result_serde_fields() {
        let msg = Message::tool_result("tc-1", "output", true);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "toolResult");
        assert_eq!(json["toolCallId"], "tc-1");
        assert_eq!(json["isError"], true);
    }

    #[test]
    fn message_tool_result_omits_false_error() {
        let msg = Message::tool_result("tc-1", "output", false);
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("isError").is_none());
    }

    #[test]
    fn message_tool_calls_extraction() {
        let call = ToolCall::new("tc-9", "Grep", Map::new());
        let msg = Message::Assistant {
            content: vec![AssistantContent::text("looking"), AssistantContent::tool_use(&call)],
            usage: None,
            stop_reason: None,
        };
        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "Grep");
        assert!(Message::user("x").tool_calls().is_empty());
    }

    #[test]
    fn message_text_joins_segments() {
        let msg = Message::Assistant {
            content: vec![
                AssistantContent::text("first"),
                AssistantContent::ToolUse {
                    id: "tc".into(),
                    name: "Read".into(),
                    input: Map::new(),
                },
                AssistantContent::text("second"),
            ],
            usage: None,
            stop_reason: None,
        };
        assert_eq!(msg.text(), "first\nsecond");
    }
}
