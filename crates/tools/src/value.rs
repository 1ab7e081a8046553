//! Helpers for reading loosely shaped skill answers.

use serde_json::Value;

/// JavaScript-style truthiness, the rule the backend's answer shapes are
/// written against (`full_result || result`).
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The first candidate that is present and truthy.
pub(crate) fn first_truthy<'a>(
    candidates: impl IntoIterator<Item = Option<&'a Value>>,
) -> Option<&'a Value> {
    candidates.into_iter().flatten().find(|v| truthy(v))
}

/// The first candidate that is present and not `null`.
pub(crate) fn first_present<'a>(
    candidates: impl IntoIterator<Item = Option<&'a Value>>,
) -> Option<&'a Value> {
    candidates.into_iter().flatten().find(|v| !v.is_null())
}

/// A non-empty string field, or `""`.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// `answer.choices[0].message.tool_calls`, the envelope LLM-backed tools answer in.
pub(crate) fn tool_calls(answer: &Value) -> Option<&Vec<Value>> {
    answer.pointer("/choices/0/message/tool_calls")?.as_array()
}

/// An array field, or an empty slice when absent or not an array.
pub(crate) fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
