//! Extractor trait and registry.
//!
//! A skill step in the answer document carries the skill's name, its
//! arguments and whatever the skill answered. An [`Extractor`] knows the
//! answer shape of one skill and turns it into a [`RenderBlock`]. The
//! [`ExtractorRegistry`] maps skill names to extractors and is handed to the
//! assembler when the host starts up; it is never mutated during a turn.

use chatkit_core::error::ExtractError;
use chatkit_core::render::RenderBlock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// One argument a skill was invoked with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillArg {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub value: Value,
}

impl SkillArg {
    /// The value as a string, if it is one.
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// The `skill_info` record of a skill step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillInfo {
    /// TOOL, MCP or AGENT
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub args: Vec<SkillArg>,
}

impl SkillInfo {
    pub fn arg(&self, name: &str) -> Option<&SkillArg> {
        self.args.iter().find(|a| a.name.as_deref() == Some(name))
    }
}

/// Read-only view of a `stage: "skill"` progress step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillStep {
    #[serde(default, alias = "skillInfo")]
    pub skill_info: SkillInfo,

    #[serde(default)]
    pub answer: Value,

    /// Seconds since the epoch
    #[serde(default)]
    pub start_time: Option<f64>,

    #[serde(default)]
    pub end_time: Option<f64>,
}

impl SkillStep {
    /// Read a progress step. Returns `None` when the step is not an object
    /// or its `skill_info` has an unexpected shape.
    pub fn from_value(step: &Value) -> Option<Self> {
        if !step.is_object() {
            return None;
        }
        match serde_json::from_value(step.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(error = %e, "Skill step has an unexpected shape");
                None
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.skill_info.name
    }

    /// Wall time of the step in milliseconds, when both timestamps are known
    /// and ordered.
    pub fn consume_time_ms(&self) -> Option<u64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if start > 0.0 && end > start => {
                Some(((end - start) * 1000.0).round() as u64)
            }
            _ => None,
        }
    }
}

/// Turns a skill answer into a render block.
///
/// Implementations must be pure: no I/O, no mutation of the step, and `None`
/// for any answer shape they do not recognize.
pub trait Extractor: Send + Sync {
    /// Skill name this extractor handles (e.g. "json2plot").
    fn name(&self) -> &str;

    fn extract(&self, step: &SkillStep) -> Option<RenderBlock>;
}

/// Skill name → extractor, with an optional fallback for unknown skills.
pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn Extractor>>,
    fallback: Option<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
            fallback: None,
        }
    }

    /// Register an extractor. Replaces any existing extractor with the same name.
    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        let name = extractor.name().to_string();
        self.extractors.insert(name, extractor);
    }

    /// Extractor used for skills without a dedicated one.
    pub fn set_fallback(&mut self, extractor: Box<dyn Extractor>) {
        self.fallback = Some(extractor);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Extractor> {
        self.extractors
            .get(name)
            .or(self.fallback.as_ref())
            .map(|e| e.as_ref())
    }

    /// List all registered skill names (the fallback is not listed).
    pub fn names(&self) -> Vec<&str> {
        self.extractors.keys().map(|s| s.as_str()).collect()
    }

    /// Run the extractor for `name`, reporting why nothing was produced.
    ///
    /// A panicking extractor is contained here and reported as
    /// [`ExtractError::Panicked`].
    pub fn try_extract(&self, name: &str, step: &SkillStep) -> Result<RenderBlock, ExtractError> {
        let extractor = self
            .get(name)
            .ok_or_else(|| ExtractError::NotRegistered(name.to_string()))?;

        match catch_unwind(AssertUnwindSafe(|| extractor.extract(step))) {
            Ok(Some(block)) => Ok(block),
            Ok(None) => Err(ExtractError::UnrecognizedShape {
                tool_name: name.to_string(),
            }),
            Err(_) => {
                warn!(tool = %name, "Extractor panicked, treating result as absent");
                Err(ExtractError::Panicked {
                    tool_name: name.to_string(),
                })
            }
        }
    }

    /// Like [`try_extract`](Self::try_extract), with every failure mapped to `None`.
    pub fn extract(&self, name: &str, step: &SkillStep) -> Option<RenderBlock> {
        match self.try_extract(name, step) {
            Ok(block) => Some(block),
            Err(e) => {
                debug!(tool = %name, reason = %e, "No block extracted");
                None
            }
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatkit_core::render::ToolCallData;
    use serde_json::json;

    struct EchoExtractor;

    impl Extractor for EchoExtractor {
        fn name(&self) -> &str {
            "echo"
        }

        fn extract(&self, step: &SkillStep) -> Option<RenderBlock> {
            let text = step.answer.as_str()?;
            Some(RenderBlock::Markdown { text: text.into() })
        }
    }

    struct PanickingExtractor;

    impl Extractor for PanickingExtractor {
        fn name(&self) -> &str {
            "boom"
        }

        fn extract(&self, _step: &SkillStep) -> Option<RenderBlock> {
            panic!("malformed answer");
        }
    }

    struct FallbackExtractor;

    impl Extractor for FallbackExtractor {
        fn name(&self) -> &str {
            "*"
        }

        fn extract(&self, step: &SkillStep) -> Option<RenderBlock> {
            Some(RenderBlock::Tool(ToolCallData {
                name: step.name().to_string(),
                title: step.name().to_string(),
                input: Value::Null,
                output: step.answer.clone(),
            }))
        }
    }

    fn step(name: &str, answer: Value) -> SkillStep {
        SkillStep::from_value(&json!({
            "stage": "skill",
            "skill_info": {"name": name},
            "answer": answer
        }))
        .unwrap()
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(EchoExtractor));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn extract_reports_unrecognized_shape() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(EchoExtractor));

        let block = registry.extract("echo", &step("echo", json!("hi")));
        assert_eq!(block, Some(RenderBlock::Markdown { text: "hi".into() }));

        let err = registry.try_extract("echo", &step("echo", json!({"x": 1}))).unwrap_err();
        assert!(matches!(err, ExtractError::UnrecognizedShape { .. }));
    }

    #[test]
    fn missing_extractor_without_fallback() {
        let registry = ExtractorRegistry::new();
        let err = registry.try_extract("nope", &step("nope", json!(1))).unwrap_err();
        assert_eq!(err, ExtractError::NotRegistered("nope".into()));
    }

    #[test]
    fn fallback_handles_unknown_skills() {
        let mut registry = ExtractorRegistry::new();
        registry.set_fallback(Box::new(FallbackExtractor));
        let block = registry.extract("custom_tool", &step("custom_tool", json!({"ok": true})));
        assert!(matches!(block, Some(RenderBlock::Tool(ref t)) if t.name == "custom_tool"));
    }

    #[test]
    fn panicking_extractor_is_contained() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Box::new(PanickingExtractor));
        let err = registry.try_extract("boom", &step("boom", json!(null))).unwrap_err();
        assert!(matches!(err, ExtractError::Panicked { .. }));
        assert!(registry.extract("boom", &step("boom", json!(null))).is_none());
    }

    #[test]
    fn skill_step_accepts_camel_case_info() {
        let step = SkillStep::from_value(&json!({
            "skillInfo": {"name": "text2sql", "args": [{"name": "input", "value": "q"}]},
            "answer": {}
        }))
        .unwrap();
        assert_eq!(step.name(), "text2sql");
        assert_eq!(step.skill_info.arg("input").and_then(SkillArg::value_str), Some("q"));
    }

    #[test]
    fn skill_step_rejects_non_objects() {
        assert!(SkillStep::from_value(&json!("text")).is_none());
        assert!(SkillStep::from_value(&json!({"skill_info": {"args": "oops"}})).is_none());
    }

    #[test]
    fn consume_time() {
        let mut s = step("x", Value::Null);
        s.start_time = Some(1700000000.25);
        s.end_time = Some(1700000001.5);
        assert_eq!(s.consume_time_ms(), Some(1250));

        s.end_time = Some(1699999999.0);
        assert_eq!(s.consume_time_ms(), None);

        s.end_time = None;
        assert_eq!(s.consume_time_ms(), None);
    }
}
