//! Web search extractor (`zhipu_search_tool`).
//!
//! The search skill answers in the chat-completion envelope:
//! `tool_calls[0]` holds the search intent (the query actually issued) and
//! `tool_calls[1]` the hits.

use crate::registry::{Extractor, SkillStep};
use crate::value::{str_field, tool_calls};
use chatkit_core::render::{RenderBlock, WebSearchResult};
use serde_json::Value;

pub struct WebSearchExtractor;

impl Extractor for WebSearchExtractor {
    fn name(&self) -> &str {
        "zhipu_search_tool"
    }

    fn extract(&self, step: &SkillStep) -> Option<RenderBlock> {
        let calls = tool_calls(&step.answer)?;
        if calls.len() < 2 {
            return None;
        }

        let intent = calls[0].get("search_intent");
        let intent = match intent {
            Some(Value::Array(items)) => items.first(),
            other => other,
        };
        let input = intent
            .map(|i| {
                let query = str_field(i, "query");
                if query.is_empty() { str_field(i, "keywords") } else { query }
            })
            .unwrap_or("")
            .to_string();

        let hits = calls[1].get("search_result")?.as_array()?;
        let results = hits
            .iter()
            .map(|item| WebSearchResult {
                title: str_field(item, "title").to_string(),
                link: str_field(item, "link").to_string(),
                content: str_field(item, "content").to_string(),
                icon: str_field(item, "icon").to_string(),
                media: str_field(item, "media").to_string(),
            })
            .collect();

        Some(RenderBlock::WebSearch { input, results })
    }
}
