//! Tool result extractors for ChatKit.
//!
//! Each skill the agent can invoke answers in its own shape. The extractors
//! here read those shapes and produce [`RenderBlock`]s: web search hits,
//! charts, code runs, SQL and metric queries, data discovery results, and a
//! generic key/value card for everything else.
//!
//! [`RenderBlock`]: chatkit_core::render::RenderBlock

pub mod datasource;
pub mod default_tool;
pub mod execute_code;
pub mod filter;
pub mod json2plot;
pub mod registry;
pub mod text2sql;
pub mod web_search;

mod value;

pub use filter::SkillFilter;
pub use registry::{Extractor, ExtractorRegistry, SkillArg, SkillInfo, SkillStep};

use datasource::{AfSailorExtractor, DatasourceExtractor, DatasourceStage};

/// Create a registry with every built-in extractor, and the generic tool
/// card as the fallback for unknown skills.
pub fn default_registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(Box::new(web_search::WebSearchExtractor));
    registry.register(Box::new(json2plot::ChartExtractor));
    registry.register(Box::new(execute_code::ExecuteCodeExtractor));
    registry.register(Box::new(text2sql::Text2SqlExtractor));
    registry.register(Box::new(text2sql::Text2MetricExtractor));
    registry.register(Box::new(AfSailorExtractor));
    registry.register(Box::new(DatasourceExtractor::new(DatasourceStage::Filter)));
    registry.register(Box::new(DatasourceExtractor::new(DatasourceStage::Rerank)));
    registry.set_fallback(Box::new(default_tool::DefaultToolExtractor));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatkit_core::render::RenderBlock;
    use serde_json::json;

    #[test]
    fn default_registry_has_builtin_extractors() {
        let registry = default_registry();
        let mut names = registry.names();
        names.sort();
        assert_eq!(
            names,
            vec![
                "af_sailor",
                "datasource_filter",
                "datasource_rerank",
                "execute_code",
                "json2plot",
                "text2metric",
                "text2sql",
                "zhipu_search_tool",
            ]
        );
    }

    #[test]
    fn unknown_skill_gets_generic_card() {
        let registry = default_registry();
        let step = SkillStep::from_value(&json!({
            "skill_info": {"name": "translate", "args": [{"name": "input", "value": "bonjour"}]},
            "answer": {"result": "hello"}
        }))
        .unwrap();
        match registry.extract("translate", &step) {
            Some(RenderBlock::Tool(t)) => {
                assert_eq!(t.title, "bonjour");
                assert_eq!(t.output, json!("hello"));
            }
            other => panic!("Expected tool block, got {other:?}"),
        }
    }

    #[test]
    fn known_skill_with_bad_shape_does_not_fall_back() {
        let registry = default_registry();
        let step = SkillStep::from_value(&json!({
            "skill_info": {"name": "json2plot"},
            "answer": "still streaming"
        }))
        .unwrap();
        assert!(registry.extract("json2plot", &step).is_none());
    }
}
