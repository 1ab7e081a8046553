//! Generic tool card for skills without a dedicated extractor.

use crate::datasource::args_object;
use crate::registry::{Extractor, SkillStep};
use crate::value::first_present;
use chatkit_core::render::{RenderBlock, ToolCallData};
use serde_json::Value;

/// Fallback extractor: input is the named args, output is `result`, then
/// `full_result`, then the whole answer.
pub struct DefaultToolExtractor;

impl Extractor for DefaultToolExtractor {
    fn name(&self) -> &str {
        "*"
    }

    fn extract(&self, step: &SkillStep) -> Option<RenderBlock> {
        let tool_name = step.name();
        if tool_name.is_empty() {
            return None;
        }

        let answer = &step.answer;
        let output = first_present([answer.get("result"), answer.get("full_result")])
            .unwrap_or(answer)
            .clone();

        let from_args = step
            .skill_info
            .args
            .iter()
            .find(|a| matches!(a.name.as_deref(), Some("input" | "query")))
            .and_then(|a| a.value_str());

        // title: input/query arg, output.title, answer.title, tool name
        let title = [
            from_args,
            output.get("title").and_then(Value::as_str),
            answer.get("title").and_then(Value::as_str),
        ]
        .into_iter()
        .flatten()
        .find(|t| !t.is_empty())
        .unwrap_or(tool_name)
        .to_string();

        Some(RenderBlock::Tool(ToolCallData {
            name: tool_name.to_string(),
            title,
            input: args_object(step),
            output,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{SkillArg, SkillInfo};
    use serde_json::json;

    fn step(name: &str, args: Vec<SkillArg>, answer: Value) -> SkillStep {
        SkillStep {
            skill_info: SkillInfo {
                kind: Some("MCP".into()),
                name: name.into(),
                args,
            },
            answer,
            ..Default::default()
        }
    }

    fn arg(name: &str, value: Value) -> SkillArg {
        SkillArg {
            name: Some(name.into()),
            kind: None,
            value,
        }
    }

    fn tool(block: Option<RenderBlock>) -> ToolCallData {
        match block {
            Some(RenderBlock::Tool(t)) => t,
            other => panic!("Expected tool block, got {other:?}"),
        }
    }

    #[test]
    fn title_from_query_arg() {
        let s = step(
            "get_weather",
            vec![arg("query", json!("Paris")), arg("unit", json!("c"))],
            json!({"result": {"temp": 21}}),
        );
        let t = tool(DefaultToolExtractor.extract(&s));
        assert_eq!(t.name, "get_weather");
        assert_eq!(t.title, "Paris");
        assert_eq!(t.input, json!({"query": "Paris", "unit": "c"}));
        assert_eq!(t.output, json!({"temp": 21}));
    }

    #[test]
    fn title_falls_back_through_output_and_answer() {
        let s = step("lookup", vec![], json!({"result": {"title": "From output"}}));
        assert_eq!(tool(DefaultToolExtractor.extract(&s)).title, "From output");

        let s = step("lookup", vec![], json!({"title": "From answer", "rows": 3}));
        let t = tool(DefaultToolExtractor.extract(&s));
        assert_eq!(t.title, "From answer");
        assert_eq!(t.output, json!({"title": "From answer", "rows": 3}));

        let s = step("lookup", vec![arg("input", json!(""))], json!(null));
        assert_eq!(tool(DefaultToolExtractor.extract(&s)).title, "lookup");
    }

    #[test]
    fn unnamed_skill_has_no_card() {
        assert!(DefaultToolExtractor.extract(&step("", vec![], json!({}))).is_none());
    }
}
