//! Model request and turn types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use keel_core::messages::{AssistantContent, Message, StopReason, TokenUsage, ToolCall};
use keel_core::tools::ToolDefinition;

/// One request to the model: the full context for a single turn.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRequest {
    /// System prompt, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Conversation history, oldest first.
    pub messages: Vec<Message>,
    /// Tool schemas available this turn.
    pub tools: Vec<ToolDefinition>,
    /// JSON Schema constraint for the final structured payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// One turn returned by the model: text and/or tool-call requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTurn {
    /// Content blocks in emission order.
    pub content: Vec<AssistantContent>,
    /// Why the model stopped.
    pub stop_reason: StopReason,
    /// Token usage for this turn.
    pub usage: TokenUsage,
}

impl ModelTurn {
    /// A text-only turn.
    #[must_use]
    pub fn text(text: impl Into<String>, stop_reason: StopReason) -> Self {
        Self {
            content: vec![AssistantContent::text(text)],
            stop_reason,
            usage: TokenUsage::default(),
        }
    }

    /// Tool calls requested in this turn, in order.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(AssistantContent::as_tool_call)
            .collect()
    }

    /// Concatenated text segments of this turn.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text { text } => Some(text.as_str()),
                AssistantContent::ToolUse { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Convert into the assistant [`Message`] appended to history.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message::Assistant {
            content: self.content,
            usage: Some(self.usage),
            stop_reason: Some(self.stop_reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_turn_has_no_tool_calls() {
        let turn = ModelTurn::text("done", StopReason::EndTurn);
        assert!(turn.tool_calls().is_empty());
        assert_eq!(turn.text_content(), "done");
        assert_eq!(turn.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn tool_calls_extracted_in_order() {
        let turn = ModelTurn {
            content: vec![
                AssistantContent::text("first I'll look around"),
                AssistantContent::ToolUse {
                    id: "tc-1".into(),
                    name: "Read".into(),
                    input: serde_json::Map::new(),
                },
                AssistantContent::ToolUse {
                    id: "tc-2".into(),
                    name: "Grep".into(),
                    input: serde_json::Map::new(),
                },
            ],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        };
        let calls = turn.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "tc-1");
        assert_eq!(calls[1].name, "Grep");
    }

    #[test]
    fn into_message_carries_usage_and_stop_reason() {
        let turn = ModelTurn {
            content: vec![AssistantContent::text("hi")],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 2,
                cache_read_tokens: None,
            },
        };
        match turn.into_message() {
            Message::Assistant {
                usage, stop_reason, ..
            } => {
                assert_eq!(usage.unwrap().input_tokens, 10);
                assert_eq!(stop_reason, Some(StopReason::EndTurn));
            }
            _ => panic!("expected assistant message"),
        }
    }

    #[test]
    fn request_serde_omits_absent_fields() {
        let request = ModelRequest {
            system_prompt: None,
            messages: vec![Message::user("hi")],
            tools: vec![],
            output_schema: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("systemPrompt").is_none());
        assert!(json.get("outputSchema").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn request_carries_output_schema() {
        let request = ModelRequest {
            output_schema: Some(json!({"type": "object"})),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["outputSchema"]["type"], "object");
    }
}
