//! Stream frames and the patch instructions parsed from them.

use crate::path::Path;
use serde::{Deserialize, Serialize};

/// One decoded `event:` / `data:` pair from a Server-Sent-Events stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// SSE event type (may be empty)
    #[serde(default)]
    pub event_type: String,

    /// Raw `data:` payload, not yet parsed
    pub data: String,
}

impl Frame {
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }
}

/// What a patch does at its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Concatenate onto a string leaf, or set an array slot
    Append,
    /// Replace the value at the path
    Upsert,
    /// The turn is complete
    End,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Upsert => "upsert",
            Self::End => "end",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed patch instruction, one per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchEvent {
    /// Backend sequence number. Carried for logging only; frames are applied
    /// in arrival order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,

    pub path: Path,

    pub action: Action,

    #[serde(default)]
    pub content: serde_json::Value,
}

impl PatchEvent {
    pub fn new(path: Path, action: Action, content: serde_json::Value) -> Self {
        Self {
            sequence: None,
            path,
            action,
            content,
        }
    }

    /// The turn-completion event.
    pub fn end() -> Self {
        Self::new(Path::root(), Action::End, serde_json::Value::Null)
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn is_end(&self) -> bool {
        self.action == Action::End
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serialization() {
        assert_eq!(serde_json::to_string(&Action::Append).unwrap(), r#""append""#);
        let action: Action = serde_json::from_str(r#""upsert""#).unwrap();
        assert_eq!(action, Action::Upsert);
        assert!(serde_json::from_str::<Action>(r#""delete""#).is_err());
    }

    #[test]
    fn end_event() {
        let event = PatchEvent::end().with_sequence(9);
        assert!(event.is_end());
        assert!(event.path.is_empty());
        assert_eq!(event.sequence, Some(9));
        assert_eq!(event.action.to_string(), "end");
    }
}
