//! Code execution extractor (`execute_code`).

use crate::registry::{Extractor, SkillStep};
use chatkit_core::render::{RenderBlock, ToolCallData};
use serde_json::Value;

const FINISHED: &str = "Execution finished";

pub struct ExecuteCodeExtractor;

impl Extractor for ExecuteCodeExtractor {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn extract(&self, step: &SkillStep) -> Option<RenderBlock> {
        let code = step
            .skill_info
            .args
            .iter()
            .find(|arg| {
                matches!(arg.name.as_deref(), Some("code" | "script"))
                    || arg.kind.as_deref() == Some("str")
            })
            .and_then(|arg| arg.value_str())
            .filter(|code| !code.is_empty())?;

        let stdout = step
            .answer
            .pointer("/result/result/stdout")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(FINISHED);

        Some(RenderBlock::Tool(ToolCallData {
            name: self.name().to_string(),
            title: "Code execution".to_string(),
            input: Value::String(code.to_string()),
            output: Value::String(stdout.to_string()),
        }))
    }
}
