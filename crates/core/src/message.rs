//! Chat message value objects held by a host's message list.

use crate::render::RenderBlock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

/// One rendered block of a message, tagged with the progress step it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBlock {
    pub slot: usize,

    /// Tool that produced the block; `None` for LLM text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consume_time_ms: Option<u64>,

    pub block: RenderBlock,
}

/// A single message in the host's list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Id the host addresses this message by (the display id while streaming)
    pub message_id: String,

    pub role: Role,

    #[serde(default)]
    pub blocks: Vec<MessageBlock>,

    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a user message holding plain text.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            role: Role::User,
            blocks: vec![MessageBlock {
                slot: 0,
                tool_name: None,
                consume_time_ms: None,
                block: RenderBlock::Markdown { text: text.into() },
            }],
            created_at: Utc::now(),
        }
    }

    /// Create an empty assistant message to stream into.
    pub fn assistant(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            role: Role::Assistant,
            blocks: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Generate a local id for an assistant message that has no canonical id yet.
    pub fn local_assistant_id() -> String {
        format!("assistant-{}", Uuid::new_v4())
    }

    /// Concatenated markdown of all text blocks.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match &b.block {
                RenderBlock::Markdown { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_has_text_block() {
        let msg = ChatMessage::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello");
    }

    #[test]
    fn local_ids_are_unique() {
        let a = ChatMessage::local_assistant_id();
        let b = ChatMessage::local_assistant_id();
        assert!(a.starts_with("assistant-"));
        assert_ne!(a, b);
    }

    #[test]
    fn role_serialization() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, r#""assistant""#);
    }
}
