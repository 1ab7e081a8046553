//! Incremental Server-Sent-Events decoder.
//!
//! Bytes arrive in arbitrary chunks: a chunk may end in the middle of a line
//! or in the middle of a multi-byte UTF-8 character. The decoder keeps both
//! the undecoded byte tail and the unterminated line across calls, so frames
//! come out identical however the stream was split.

use chatkit_core::event::Frame;
use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::trace;

/// End-of-stream sentinel sent as a `data:` payload.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Just enough of a payload to name its event when no `event:` line did.
#[derive(Deserialize)]
struct EventHint {
    #[serde(default)]
    event: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    kind: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes not yet decoded (an incomplete UTF-8 sequence)
    bytes: Vec<u8>,
    /// Decoded text not yet terminated by `\n`
    line: String,
    /// Event type from the last `event:` line, consumed by the next frame
    /// whose payload parses
    pending_event: Option<String>,
    saw_done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.bytes.extend_from_slice(chunk);
        self.decode_utf8(false);
        self.drain_lines()
    }

    /// Flush at end of stream: a held-back partial character decodes as
    /// U+FFFD and an unterminated last line is processed.
    pub fn finish(&mut self) -> Vec<Frame> {
        self.decode_utf8(true);
        let mut frames = self.drain_lines();
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            if let Some(frame) = self.handle_line(line.trim_end_matches('\r')) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn saw_done(&self) -> bool {
        self.saw_done
    }

    fn decode_utf8(&mut self, flush: bool) {
        let mut start = 0;
        while start < self.bytes.len() {
            match std::str::from_utf8(&self.bytes[start..]) {
                Ok(text) => {
                    self.line.push_str(text);
                    start = self.bytes.len();
                }
                Err(e) => {
                    let valid = start + e.valid_up_to();
                    self.line
                        .push_str(&String::from_utf8_lossy(&self.bytes[start..valid]));
                    match e.error_len() {
                        Some(len) => {
                            self.line.push(char::REPLACEMENT_CHARACTER);
                            start = valid + len;
                        }
                        None if flush => {
                            self.line.push(char::REPLACEMENT_CHARACTER);
                            start = self.bytes.len();
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes.
                            start = valid;
                            break;
                        }
                    }
                }
            }
        }
        self.bytes.drain(..start);
    }

    fn drain_lines(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(end) = self.line.find('\n') {
            let line: String = self.line.drain(..=end).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(frame) = self.handle_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn handle_line(&mut self, line: &str) -> Option<Frame> {
        // Nothing after the sentinel belongs to this stream.
        if self.saw_done || line.trim().is_empty() || line.starts_with(':') {
            return None;
        }

        if let Some(event) = line.strip_prefix("event:") {
            self.pending_event = Some(event.trim().to_string());
            return None;
        }

        let data = line.strip_prefix("data:")?.trim();
        if data == DONE_SENTINEL {
            trace!("Received [DONE] sentinel");
            self.saw_done = true;
            return None;
        }

        let event_type = match &self.pending_event {
            Some(event) if !event.is_empty() => {
                let event = event.clone();
                // An unparseable payload leaves the event for the next one.
                if serde_json::from_str::<IgnoredAny>(data).is_ok() {
                    self.pending_event = None;
                }
                event
            }
            _ => {
                self.pending_event = None;
                event_type_of(data)
            }
        };
        Some(Frame::new(event_type, data))
    }
}

/// The payload's own `event` or `type` string, or empty.
fn event_type_of(data: &str) -> String {
    let Ok(hint) = serde_json::from_str::<EventHint>(data) else {
        return String::new();
    };
    [hint.event, hint.kind]
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()).map(str::to_string))
        .unwrap_or_default()
}
