//! A ready-made [`RenderSink`] that keeps a conversation as a list of
//! [`ChatMessage`]s.
//!
//! Hosts with their own message store implement [`RenderSink`] directly.
//! The CLI and the tests use this one.

use chatkit_core::message::{ChatMessage, MessageBlock, Role};
use chatkit_core::render::{RenderBlock, RenderSink, ToolBlock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, message_id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.message_id == message_id)
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.messages.push(ChatMessage::user(text));
        &self.messages[self.messages.len() - 1]
    }

    /// Add an empty assistant entry for `display_id`, or clear the blocks of
    /// the existing one when regenerating.
    pub fn start_assistant_turn(&mut self, display_id: &str) {
        match self.find_mut(display_id) {
            Some(message) => {
                debug!(display_id, "Clearing message for regeneration");
                message.blocks.clear();
            }
            None => self.messages.push(ChatMessage::assistant(display_id)),
        }
    }

    fn find_mut(&mut self, message_id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.message_id == message_id)
    }

    /// Callbacks for an id the transcript has never seen open a new entry.
    fn assistant_mut(&mut self, display_id: &str) -> &mut ChatMessage {
        let index = match self.messages.iter().position(|m| m.message_id == display_id) {
            Some(index) => index,
            None => {
                self.messages.push(ChatMessage::assistant(display_id));
                self.messages.len() - 1
            }
        };
        &mut self.messages[index]
    }
}

fn upsert_block(blocks: &mut Vec<MessageBlock>, block: MessageBlock) {
    let existing = blocks
        .iter_mut()
        .find(|b| b.slot == block.slot && b.tool_name == block.tool_name);
    match existing {
        Some(slot) => *slot = block,
        None => {
            // Keep blocks in progress order.
            let at = blocks.partition_point(|b| b.slot <= block.slot);
            blocks.insert(at, block);
        }
    }
}

impl RenderSink for Transcript {
    fn on_text_delta(&mut self, display_id: &str, slot: usize, full_text: &str) {
        let message = self.assistant_mut(display_id);
        upsert_block(
            &mut message.blocks,
            MessageBlock {
                slot,
                tool_name: None,
                consume_time_ms: None,
                block: RenderBlock::Markdown {
                    text: full_text.to_string(),
                },
            },
        );
    }

    fn on_tool_block(&mut self, display_id: &str, tool_name: &str, block: ToolBlock) {
        let message = self.assistant_mut(display_id);
        upsert_block(
            &mut message.blocks,
            MessageBlock {
                slot: block.slot,
                tool_name: Some(tool_name.to_string()),
                consume_time_ms: block.consume_time_ms,
                block: block.block,
            },
        );
    }

    fn on_identity_renamed(&mut self, old_id: &str, new_id: &str) {
        if self.get(new_id).is_some() {
            warn!(old_id, new_id, "Renamed id already present, dropping local entry");
            self.messages.retain(|m| m.message_id != old_id);
            return;
        }
        match self.find_mut(old_id) {
            Some(message) if message.role == Role::Assistant => {
                message.message_id = new_id.to_string();
            }
            _ => self.messages.push(ChatMessage::assistant(new_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatkit_core::render::ToolCallData;
    use serde_json::json;

    fn tool(slot: usize, title: &str) -> ToolBlock {
        ToolBlock {
            slot,
            consume_time_ms: Some(12),
            block: RenderBlock::Tool(ToolCallData {
                name: "text2sql".into(),
                title: title.into(),
                input: json!("orders"),
                output: json!({"data": []}),
            }),
        }
    }

    #[test]
    fn text_delta_replaces_slot_text() {
        let mut t = Transcript::new();
        t.push_user("hi");
        t.start_assistant_turn("tmp");
        t.on_text_delta("tmp", 0, "Hel");
        t.on_text_delta("tmp", 0, "Hello");

        let msg = t.get("tmp").unwrap();
        assert_eq!(msg.blocks.len(), 1);
        assert_eq!(msg.text(), "Hello");
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn tool_blocks_are_keyed_by_slot_and_name() {
        let mut t = Transcript::new();
        t.start_assistant_turn("m");
        t.on_text_delta("m", 2, "after");
        t.on_tool_block("m", "text2sql", tool(1, "first"));
        t.on_tool_block("m", "text2sql", tool(1, "second"));

        let blocks = &t.get("m").unwrap().blocks;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].slot, 1);
        assert_eq!(blocks[0].consume_time_ms, Some(12));
        assert!(matches!(&blocks[0].block, RenderBlock::Tool(data) if data.title == "second"));
        assert_eq!(blocks[1].slot, 2);
    }

    #[test]
    fn rename_moves_entry_to_canonical_id() {
        let mut t = Transcript::new();
        t.start_assistant_turn("tmp");
        t.on_text_delta("tmp", 0, "a");
        t.on_identity_renamed("tmp", "m-1");
        t.on_text_delta("m-1", 0, "ab");

        assert!(t.get("tmp").is_none());
        assert_eq!(t.len(), 1);
        assert_eq!(t.get("m-1").unwrap().text(), "ab");
    }

    #[test]
    fn regenerate_clears_existing_blocks() {
        let mut t = Transcript::new();
        t.start_assistant_turn("m-1");
        t.on_text_delta("m-1", 0, "old answer");
        t.start_assistant_turn("m-1");

        assert_eq!(t.len(), 1);
        assert!(t.get("m-1").unwrap().blocks.is_empty());
    }

    #[test]
    fn unknown_id_opens_an_entry() {
        let mut t = Transcript::new();
        t.on_text_delta("late", 0, "x");
        assert_eq!(t.last().map(|m| m.role.clone()), Some(Role::Assistant));
    }
}
