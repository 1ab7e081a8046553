//! Data discovery extractors: `af_sailor`, `datasource_filter` and
//! `datasource_rerank`.

use crate::registry::{Extractor, SkillStep};
use crate::value::{array_field, truthy};
use chatkit_core::render::{RenderBlock, ToolCallData};
use serde_json::{Value, json};

pub struct AfSailorExtractor;

impl Extractor for AfSailorExtractor {
    fn name(&self) -> &str {
        "af_sailor"
    }

    fn extract(&self, step: &SkillStep) -> Option<RenderBlock> {
        let result = step.answer.get("result").filter(|r| truthy(r))?;

        let text = array_field(result, "text");
        if text.is_empty() {
            return None;
        }

        // Plain strings become `{value, index}` records so every row is an object.
        let data: Vec<Value> = text
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => json!({ "value": s, "index": i.to_string() }),
                other => other.clone(),
            })
            .collect();

        Some(RenderBlock::Tool(ToolCallData {
            name: self.name().to_string(),
            title: format!("Found {} records", data.len()),
            input: args_object(step),
            output: json!({
                "data": data,
                "text": text,
                "cites": array_field(result, "cites"),
                "result_cache_key": result.get("result_cache_key").cloned().unwrap_or(Value::Null),
            }),
        }))
    }
}

/// Which of the two catalog-matching skills this extractor serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasourceStage {
    Filter,
    Rerank,
}

/// `datasource_filter` and `datasource_rerank` share one answer shape:
/// `result.result` is the list of matched catalog entries.
pub struct DatasourceExtractor {
    stage: DatasourceStage,
}

impl DatasourceExtractor {
    pub fn new(stage: DatasourceStage) -> Self {
        Self { stage }
    }
}

impl Extractor for DatasourceExtractor {
    fn name(&self) -> &str {
        match self.stage {
            DatasourceStage::Filter => "datasource_filter",
            DatasourceStage::Rerank => "datasource_rerank",
        }
    }

    fn extract(&self, step: &SkillStep) -> Option<RenderBlock> {
        let data = step.answer.get("result").filter(|r| truthy(r))?;
        let matches = array_field(data, "result");
        if matches.is_empty() {
            return None;
        }

        let title = match self.stage {
            DatasourceStage::Filter => format!("Matched {} datasets", matches.len()),
            DatasourceStage::Rerank => format!("Reranked {} datasets", matches.len()),
        };

        Some(RenderBlock::Tool(ToolCallData {
            name: self.name().to_string(),
            title,
            input: args_object(step),
            output: json!({
                "result": matches,
                "result_cache_key": data.get("result_cache_key").cloned().unwrap_or(Value::Null),
            }),
        }))
    }
}

/// Named skill arguments as a `{name: value}` object.
pub(crate) fn args_object(step: &SkillStep) -> Value {
    let map = step
        .skill_info
        .args
        .iter()
        .filter_map(|arg| Some((arg.name.clone()?, arg.value.clone())))
        .collect();
    Value::Object(map)
}
