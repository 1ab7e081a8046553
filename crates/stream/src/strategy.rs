//! Backend strategies: how one backend's frames become patch events.
//!
//! The assembler is backend-agnostic. It asks its [`BackendStrategy`] to
//! turn each frame into a [`PatchEvent`] and from then on only deals with
//! paths, actions and content. Any frame the strategy cannot make sense of
//! yields `None` and is skipped.

use chatkit_core::event::{Action, Frame, PatchEvent};
use chatkit_core::path::Path;
use serde_json::{Map, Value, json};
use tracing::debug;

/// Progress root used by backends that answer in a single LLM step.
pub const MIDDLE_ANSWER_PROGRESS: &str = "message.content.middle_answer.progress";

/// Turns decoded frames into patch events for one backend protocol.
pub trait BackendStrategy: Send {
    /// Human-readable strategy name (e.g. "dip", "coze").
    fn name(&self) -> &str;

    /// Decode the frame payload. The default parses `data` as JSON.
    fn parse_frame(&self, frame: &Frame) -> Option<Value> {
        match serde_json::from_str(&frame.data) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(strategy = self.name(), error = %e, "Frame payload is not JSON");
                None
            }
        }
    }

    /// Map a decoded payload onto the patch protocol.
    fn to_patch_event(&mut self, event_type: &str, payload: Value) -> Option<PatchEvent>;

    /// Forget per-turn state before a new turn starts.
    fn reset(&mut self) {}

    fn parse(&mut self, frame: &Frame) -> Option<PatchEvent> {
        let payload = self.parse_frame(frame)?;
        self.to_patch_event(&frame.event_type, payload)
    }
}

// ── DIP ──────────────────────────────────────────────────────────────

/// The DIP agent protocol: every frame already is a patch,
/// `{ seq_id, key, action, content }`.
#[derive(Debug, Default, Clone)]
pub struct DipStrategy;

impl DipStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl BackendStrategy for DipStrategy {
    fn name(&self) -> &str {
        "dip"
    }

    fn to_patch_event(&mut self, _event_type: &str, payload: Value) -> Option<PatchEvent> {
        let Some(mut obj) = unwrap_envelope(payload) else {
            debug!("DIP frame is not an object");
            return None;
        };

        let action = match obj.get("action").and_then(Value::as_str) {
            Some("append") => Action::Append,
            Some("upsert") => Action::Upsert,
            Some("end") => Action::End,
            other => {
                debug!(action = ?other, "DIP frame has no known action");
                return None;
            }
        };

        let sequence = ["seq_id", "seq"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_u64));

        let event = if action == Action::End {
            PatchEvent::end()
        } else {
            let path = match obj.remove("key") {
                None | Some(Value::Null) => Path::root(),
                Some(key) => match serde_json::from_value::<Path>(key) {
                    Ok(path) => path,
                    Err(e) => {
                        debug!(error = %e, "DIP frame has a malformed key");
                        return None;
                    }
                },
            };
            let content = obj.remove("content").unwrap_or(Value::Null);
            PatchEvent::new(path, action, content)
        };

        Some(match sequence {
            Some(seq) => event.with_sequence(seq),
            None => event,
        })
    }
}

/// Some gateways wrap the patch as `{ "data": <patch or patch string> }`.
fn unwrap_envelope(payload: Value) -> Option<Map<String, Value>> {
    let Value::Object(obj) = payload else {
        return None;
    };
    if obj.contains_key("action") {
        return Some(obj);
    }
    match obj.get("data") {
        Some(Value::Object(inner)) => Some(inner.clone()),
        Some(Value::String(inner)) => match serde_json::from_str(inner) {
            Ok(Value::Object(inner)) => Some(inner),
            _ => Some(obj),
        },
        _ => Some(obj),
    }
}

// ── Coze ─────────────────────────────────────────────────────────────

/// The Coze v3 chat protocol: text deltas, mapped onto a single LLM step at
/// `message.content.middle_answer.progress[0]`.
#[derive(Debug, Default, Clone)]
pub struct CozeStrategy {
    slot_open: bool,
    conversation_recorded: bool,
}

impl CozeStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_path() -> Path {
        chatkit_core::path!["message", "content", "middle_answer", "progress", 0usize]
    }

    fn llm_step(&mut self, text: &str) -> PatchEvent {
        self.slot_open = true;
        PatchEvent::new(
            Self::slot_path(),
            Action::Append,
            json!({ "stage": "llm", "answer": text }),
        )
    }
}

impl BackendStrategy for CozeStrategy {
    fn name(&self) -> &str {
        "coze"
    }

    fn to_patch_event(&mut self, event_type: &str, payload: Value) -> Option<PatchEvent> {
        let is_answer = payload.get("type").and_then(Value::as_str) == Some("answer");
        let text = payload
            .get("content")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());

        match event_type {
            "conversation.message.delta" if is_answer => {
                let text = text?;
                if self.slot_open {
                    Some(PatchEvent::new(
                        Self::slot_path().child("answer"),
                        Action::Append,
                        Value::String(text.to_string()),
                    ))
                } else {
                    Some(self.llm_step(text))
                }
            }
            "conversation.message.completed" if is_answer => Some(self.llm_step(text?)),
            "conversation.chat.completed" | "done" => Some(PatchEvent::end()),
            _ => {
                // Events with nothing to render still carry the conversation id.
                let conversation_id = payload
                    .get("conversation_id")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty());
                match conversation_id {
                    Some(id) if !self.conversation_recorded => {
                        self.conversation_recorded = true;
                        Some(PatchEvent::new(
                            chatkit_core::path!["message", "conversation_id"],
                            Action::Upsert,
                            Value::String(id.to_string()),
                        ))
                    }
                    _ => {
                        debug!(event = event_type, "Ignoring Coze event");
                        None
                    }
                }
            }
        }
    }

    fn reset(&mut self) {
        self.slot_open = false;
        self.conversation_recorded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatkit_core::path;

    fn dip(data: &str) -> Option<PatchEvent> {
        DipStrategy::new().parse(&Frame::new("", data))
    }

    #[test]
    fn dip_append_with_key() {
        let event = dip(r#"{"seq_id":3,"key":["message","content","progress",0],"action":"append","content":{"stage":"llm"}}"#)
            .unwrap();
        assert_eq!(event.sequence, Some(3));
        assert_eq!(event.action, Action::Append);
        assert_eq!(event.path, path!["message", "content", "progress", 0usize]);
        assert_eq!(event.content, json!({"stage": "llm"}));
    }

    #[test]
    fn dip_missing_key_and_content() {
        let event = dip(r#"{"action":"upsert","seq":9}"#).unwrap();
        assert!(event.path.is_empty());
        assert_eq!(event.content, Value::Null);
        assert_eq!(event.sequence, Some(9));
    }

    #[test]
    fn dip_end() {
        let event = dip(r#"{"seq_id":12,"action":"end"}"#).unwrap();
        assert!(event.is_end());
        assert_eq!(event.sequence, Some(12));
    }

    #[test]
    fn dip_rejects_malformed_frames() {
        assert!(dip("not json").is_none());
        assert!(dip(r#"{"key":["a"],"content":1}"#).is_none());
        assert!(dip(r#"{"key":["a"],"action":"delete"}"#).is_none());
        assert!(dip(r#"{"key":["a",-1],"action":"append"}"#).is_none());
        assert!(dip(r#"{"key":[{"x":1}],"action":"upsert"}"#).is_none());
        assert!(dip(r#"[1,2]"#).is_none());
    }

    #[test]
    fn dip_unwraps_data_envelope() {
        let event = dip(r#"{"data":"{\"key\":[\"message\",\"id\"],\"action\":\"upsert\",\"content\":\"m-1\"}"}"#)
            .unwrap();
        assert_eq!(event.path, path!["message", "id"]);
        assert_eq!(event.content, json!("m-1"));
    }

    fn coze(strategy: &mut CozeStrategy, event: &str, data: Value) -> Option<PatchEvent> {
        strategy.parse(&Frame::new(event, data.to_string()))
    }

    #[test]
    fn coze_deltas_build_one_llm_step() {
        let mut s = CozeStrategy::new();
        let first = coze(&mut s, "conversation.message.delta", json!({"type": "answer", "content": "Hel"})).unwrap();
        assert_eq!(first.path.to_json_path(), "message.content.middle_answer.progress[0]");
        assert_eq!(first.content, json!({"stage": "llm", "answer": "Hel"}));

        let second = coze(&mut s, "conversation.message.delta", json!({"type": "answer", "content": "lo"})).unwrap();
        assert_eq!(second.path.to_json_path(), "message.content.middle_answer.progress[0].answer");
        assert_eq!(second.content, json!("lo"));
    }

    #[test]
    fn coze_completed_resets_slot_with_full_text() {
        let mut s = CozeStrategy::new();
        let event = coze(&mut s, "conversation.message.completed", json!({"type": "answer", "content": "Hello"})).unwrap();
        assert_eq!(event.action, Action::Append);
        assert_eq!(event.content, json!({"stage": "llm", "answer": "Hello"}));

        let verbose = coze(&mut s, "conversation.message.completed", json!({"type": "verbose", "content": "{}"}));
        assert!(verbose.is_none());
    }

    #[test]
    fn coze_end_events() {
        let mut s = CozeStrategy::new();
        assert!(coze(&mut s, "conversation.chat.completed", json!({})).unwrap().is_end());
        assert!(coze(&mut s, "done", json!("[DONE]")).unwrap().is_end());
    }

    #[test]
    fn coze_records_conversation_once() {
        let mut s = CozeStrategy::new();
        let created = json!({"conversation_id": "c-1", "status": "created"});
        let event = coze(&mut s, "conversation.chat.created", created.clone()).unwrap();
        assert_eq!(event.path, path!["message", "conversation_id"]);
        assert_eq!(event.action, Action::Upsert);

        assert!(coze(&mut s, "conversation.chat.in_progress", created.clone()).is_none());

        s.reset();
        assert!(coze(&mut s, "conversation.chat.created", created).is_some());
    }

    #[test]
    fn coze_reset_reopens_slot() {
        let mut s = CozeStrategy::new();
        coze(&mut s, "conversation.message.delta", json!({"type": "answer", "content": "a"}));
        s.reset();
        let event = coze(&mut s, "conversation.message.delta", json!({"type": "answer", "content": "b"})).unwrap();
        assert_eq!(event.content, json!({"stage": "llm", "answer": "b"}));
    }
}
