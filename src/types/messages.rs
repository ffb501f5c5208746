//! Claude Code CLI message types
//!
//! The CLI run with `--output-format stream-json` prints one JSON object per
//! line. Only the parts the bridge reads are modelled here.

use super::identifiers::SessionId;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

// ============================================================================
// Message Types
// ============================================================================

/// Content block types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content block
    Text {
        /// Text content
        text: String,
    },
    /// Thinking content block (extended thinking)
    Thinking {
        /// Thinking content
        thinking: String,
        /// Signature for verification
        #[serde(default)]
        signature: String,
    },
    /// Tool use request
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool input parameters
        input: serde_json::Value,
    },
    /// Tool execution result
    ToolResult {
        /// ID of the tool use this is a result for
        tool_use_id: String,
        /// Result content
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<serde_json::Value>,
        /// Whether this is an error result
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Assistant message content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessageContent {
    /// Model that generated the message
    #[serde(default)]
    pub model: String,
    /// Message content blocks
    pub content: Vec<ContentBlock>,
}

impl AssistantMessageContent {
    /// Concatenated text blocks of the message
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// User message (tool results echoed back by the CLI)
    User {
        /// Raw message payload
        message: serde_json::Value,
        /// Session ID
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
    /// Assistant message
    Assistant {
        /// Message content
        message: AssistantMessageContent,
        /// Session ID
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
    /// System message
    System {
        /// System message subtype
        subtype: String,
        /// Additional system message data
        #[serde(flatten)]
        data: serde_json::Value,
    },
    /// Final result message with metrics
    Result {
        /// Result subtype
        subtype: String,
        /// Total duration in milliseconds
        #[serde(default)]
        duration_ms: u64,
        /// Whether this is an error result
        is_error: bool,
        /// Number of conversation turns
        #[serde(default)]
        num_turns: u32,
        /// Session ID
        session_id: SessionId,
        /// Total cost in USD
        #[serde(skip_serializing_if = "Option::is_none")]
        total_cost_usd: Option<f64>,
        /// Result message
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
}

/// Parse a JSON value into a typed Message
///
/// # Errors
/// Returns `BridgeError::MessageParse` if the JSON is not a known message
pub fn parse_message(data: serde_json::Value) -> Result<Message> {
    serde_json::from_value(data.clone()).map_err(|e| {
        BridgeError::message_parse(format!("Failed to parse message: {e}"), Some(data))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_result_message() {
        let data = json!({
            "type": "result",
            "subtype": "success",
            "duration_ms": 1200,
            "duration_api_ms": 900,
            "is_error": false,
            "num_turns": 2,
            "session_id": "abc-123",
            "total_cost_usd": 0.0125,
            "result": "Hello!"
        });

        match parse_message(data) {
            Ok(Message::Result {
                session_id,
                total_cost_usd,
                result,
                ..
            }) => {
                assert_eq!(session_id.as_str(), "abc-123");
                assert_eq!(total_cost_usd, Some(0.0125));
                assert_eq!(result.as_deref(), Some("Hello!"));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn assistant_text_joins_text_blocks() {
        let data = json!({
            "type": "assistant",
            "message": {
                "model": "claude",
                "content": [
                    {"type": "text", "text": "one"},
                    {"type": "tool_use", "id": "t1", "name": "Read", "input": {}},
                    {"type": "text", "text": "two"}
                ]
            }
        });

        let Ok(Message::Assistant { message, .. }) = parse_message(data) else {
            panic!("expected assistant message");
        };
        assert_eq!(message.text(), "one\ntwo");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = parse_message(json!({"type": "invalid_type", "data": 1}));
        assert!(result.is_err());
    }
}
