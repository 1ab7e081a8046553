//! Chart extractor (`json2plot`).
//!
//! `chart_config` names the x/group/series/y fields; any role the config
//! leaves unresolved is inferred from the value types of the first row.

use crate::registry::{Extractor, SkillStep};
use crate::value::{first_truthy, str_field};
use chatkit_core::render::{ChartData, ChartField, ChartType, FieldType, RenderBlock};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

pub struct ChartExtractor;

impl Extractor for ChartExtractor {
    fn name(&self) -> &str {
        "json2plot"
    }

    fn extract(&self, step: &SkillStep) -> Option<RenderBlock> {
        let answer = &step.answer;
        let plot = first_truthy([answer.get("full_result"), answer.get("result")])?;

        let config = plot.get("chart_config")?;
        let chart_type = ChartType::parse(config.get("chart_type")?.as_str()?)?;

        let rows = first_truthy([plot.get("data"), plot.get("data_sample")])?.as_array()?;
        let first = rows.first()?.as_object()?;

        let x = config_field(config, "xField");
        let group = config_field(config, "groupField");
        let series = config_field(config, "seriesField");
        let y = config_field(config, "yField");

        let mut dimensions = Vec::new();
        let mut roles: Vec<&str> = Vec::new();
        for candidate in [x, group, series].into_iter().flatten() {
            if roles.contains(&candidate) {
                continue;
            }
            roles.push(candidate);
            if let Some(value) = first.get(candidate) {
                dimensions.push(field(candidate, infer_field_type(value)));
            }
        }

        let mut measures = Vec::new();
        if let Some(y) = y {
            if first.contains_key(y) {
                measures.push(field(y, FieldType::Number));
            }
        }

        if dimensions.is_empty() || measures.is_empty() {
            infer_missing(first, &mut dimensions, &mut measures);
        }
        if dimensions.is_empty() || measures.is_empty() {
            return None;
        }

        let title = plot
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(RenderBlock::Chart(ChartData {
            chart_type,
            title,
            dimensions,
            measures,
            rows: rows.clone(),
        }))
    }
}

fn config_field<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    Some(str_field(config, key)).filter(|s| !s.is_empty())
}

fn field(name: &str, data_type: FieldType) -> ChartField {
    ChartField {
        name: name.to_string(),
        display_name: name.to_string(),
        data_type,
    }
}

/// Fill an empty role with the first column of the matching kind:
/// a non-numeric column for the dimension, a numeric one for the measure.
fn infer_missing(row: &Map<String, Value>, dimensions: &mut Vec<ChartField>, measures: &mut Vec<ChartField>) {
    let typed: Vec<(&String, FieldType)> = row
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, infer_field_type(v)))
        .collect();

    if dimensions.is_empty() {
        if let Some((name, ty)) = typed
            .iter()
            .find(|(k, ty)| *ty != FieldType::Number && !measures.iter().any(|m| &m.name == *k))
        {
            dimensions.push(field(name, *ty));
        }
    }

    if measures.is_empty() {
        if let Some((name, _)) = typed
            .iter()
            .find(|(k, ty)| *ty == FieldType::Number && !dimensions.iter().any(|d| &d.name == *k))
        {
            measures.push(field(name, FieldType::Number));
        }
    }
}

/// Infer a column type from one sample value. Strings that parse as a date
/// or timestamp count as dates.
pub fn infer_field_type(value: &Value) -> FieldType {
    match value {
        Value::Bool(_) => FieldType::Boolean,
        Value::Number(_) => FieldType::Number,
        Value::String(s) if looks_like_date(s) => FieldType::Date,
        _ => FieldType::String,
    }
}

fn looks_like_date(s: &str) -> bool {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDate::parse_from_str(s, "%Y/%m/%d").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
}
