//! Natural-language query extractors: `text2sql` and `text2metric`.
//!
//! Both skills answer with a `result` (sample rows plus `data_desc`) and an
//! optional `full_result` (all rows, no `data_desc`); the full result wins
//! when present.

use crate::registry::{Extractor, SkillStep};
use crate::value::{array_field, first_truthy, str_field};
use chatkit_core::render::{RenderBlock, ToolCallData};
use serde_json::{Value, json};

pub struct Text2SqlExtractor;

impl Extractor for Text2SqlExtractor {
    fn name(&self) -> &str {
        "text2sql"
    }

    fn extract(&self, step: &SkillStep) -> Option<RenderBlock> {
        let answer = &step.answer;
        let data = first_truthy([answer.get("full_result"), answer.get("result")])?;

        let input = step
            .skill_info
            .arg("input")
            .and_then(|a| a.value_str())
            .filter(|s| !s.is_empty())?;

        let rows = array_field(data, "data");
        let cites: Vec<Value> = array_field(data, "cites")
            .iter()
            .map(|c| {
                json!({
                    "id": str_field(c, "id"),
                    "name": str_field(c, "name"),
                    "type": str_field(c, "type"),
                    "description": c.get("description").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();

        let title = str_field(data, "title");
        let title = if title.is_empty() {
            format!("Found {} records", rows.len())
        } else {
            title.to_string()
        };

        let data_desc = answer
            .pointer("/result/data_desc")
            .filter(|d| d.is_object())
            .map(|d| {
                json!({
                    "return_records_num": d.get("return_records_num").cloned().unwrap_or(Value::Null),
                    "real_records_num": d.get("real_records_num").cloned().unwrap_or(Value::Null),
                })
            })
            .unwrap_or(Value::Null);

        Some(RenderBlock::Tool(ToolCallData {
            name: self.name().to_string(),
            title,
            input: Value::String(input.to_string()),
            output: json!({
                "sql": str_field(data, "sql"),
                "data": rows,
                "cites": cites,
                "message": str_field(data, "message"),
                "data_desc": data_desc,
                "explanation": data.get("explanation").cloned().unwrap_or(Value::Null),
            }),
        }))
    }
}

pub struct Text2MetricExtractor;

impl Extractor for Text2MetricExtractor {
    fn name(&self) -> &str {
        "text2metric"
    }

    fn extract(&self, step: &SkillStep) -> Option<RenderBlock> {
        let answer = &step.answer;
        let data = first_truthy([answer.get("full_result"), answer.get("result")])?;

        let title = str_field(data, "title");
        if title.is_empty() {
            return None;
        }

        let args = serde_json::to_value(&step.skill_info.args).unwrap_or(Value::Null);

        Some(RenderBlock::Tool(ToolCallData {
            name: self.name().to_string(),
            title: title.to_string(),
            input: args,
            output: json!({ "data": array_field(data, "data") }),
        }))
    }
}
