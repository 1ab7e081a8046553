//! Render blocks and the callbacks the assembler drives.
//!
//! The assembler never renders anything itself. It calls a [`RenderSink`]
//! owned by the host: a message list, a terminal printer, or in tests a
//! plain `Vec<RenderEvent>` that records every callback.

use serde::{Deserialize, Serialize};

/// A single web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub title: String,
    pub link: String,
    pub content: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub media: String,
}

/// Supported chart kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartType {
    Line,
    Column,
    Pie,
    Circle,
}

impl ChartType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Line" => Some(Self::Line),
            "Column" => Some(Self::Column),
            "Pie" => Some(Self::Pie),
            "Circle" => Some(Self::Circle),
            _ => None,
        }
    }
}

/// Inferred type of a chart column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Date,
    Boolean,
}

/// A dimension or measure column of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartField {
    pub name: String,
    pub display_name: String,
    pub data_type: FieldType,
}

/// A chart ready for a plotting widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub chart_type: ChartType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub dimensions: Vec<ChartField>,
    pub measures: Vec<ChartField>,
    pub rows: Vec<serde_json::Value>,
}

/// A generic tool card: title, what went in, what came out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallData {
    pub name: String,
    pub title: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
}

/// Renderable content derived from the answer document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderBlock {
    /// Markdown text from an LLM step
    Markdown { text: String },

    /// A web search: the query and its hits
    WebSearch {
        input: String,
        results: Vec<WebSearchResult>,
    },

    /// A chart
    Chart(ChartData),

    /// Any other tool invocation
    Tool(ToolCallData),
}

/// A tool block tied to the progress slot that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolBlock {
    /// Index of the progress step
    pub slot: usize,

    /// Wall time of the step in milliseconds, when the backend reported it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consume_time_ms: Option<u64>,

    pub block: RenderBlock,
}

/// The host-side render layer.
///
/// All three callbacks have replace semantics: the text passed to
/// `on_text_delta` is the full current answer of the slot, and a tool block
/// for a slot already shown must replace the earlier one.
pub trait RenderSink {
    /// LLM text for `slot` grew; `full_text` is the whole string so far.
    fn on_text_delta(&mut self, display_id: &str, slot: usize, full_text: &str);

    /// Create or replace the block of a tool step.
    fn on_tool_block(&mut self, display_id: &str, tool_name: &str, block: ToolBlock);

    /// The backend assigned a canonical id to the in-flight message.
    fn on_identity_renamed(&mut self, old_id: &str, new_id: &str);
}

/// A recorded render callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RenderEvent {
    TextDelta {
        display_id: String,
        slot: usize,
        text: String,
    },
    ToolBlock {
        display_id: String,
        tool_name: String,
        block: ToolBlock,
    },
    IdentityRenamed {
        old_id: String,
        new_id: String,
    },
}

impl RenderSink for Vec<RenderEvent> {
    fn on_text_delta(&mut self, display_id: &str, slot: usize, full_text: &str) {
        self.push(RenderEvent::TextDelta {
            display_id: display_id.to_string(),
            slot,
            text: full_text.to_string(),
        });
    }

    fn on_tool_block(&mut self, display_id: &str, tool_name: &str, block: ToolBlock) {
        self.push(RenderEvent::ToolBlock {
            display_id: display_id.to_string(),
            tool_name: tool_name.to_string(),
            block,
        });
    }

    fn on_identity_renamed(&mut self, old_id: &str, new_id: &str) {
        self.push(RenderEvent::IdentityRenamed {
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
        });
    }
}
