//! Field accessors for untrusted LLM payloads.
//!
//! Every structured response is parsed to a `serde_json::Value` first and
//! walked through these helpers. A present field with the wrong type is a
//! schema violation; an absent or null field falls back to the type's empty
//! form. Nothing is partially salvaged.

use serde_json::{Map, Value};

use crate::llm_client::LlmError;

pub fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, LlmError> {
    value
        .as_object()
        .ok_or_else(|| LlmError::Schema(format!("{what} payload is not a JSON object")))
}

pub fn required_string(obj: &Map<String, Value>, field: &str) -> Result<String, LlmError> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(LlmError::Schema(format!(
            "required field '{field}' is empty"
        ))),
        None | Some(Value::Null) => Err(LlmError::Schema(format!(
            "missing required field '{field}'"
        ))),
        Some(_) => Err(LlmError::Schema(format!(
            "field '{field}' must be a string"
        ))),
    }
}

pub fn optional_string(
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<String>, LlmError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(_) => Err(LlmError::Schema(format!(
            "field '{field}' must be a string"
        ))),
    }
}

pub fn string_list(obj: &Map<String, Value>, field: &str) -> Result<Vec<String>, LlmError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(vec![]),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => {
                        let s = s.trim();
                        if !s.is_empty() {
                            out.push(s.to_string());
                        }
                    }
                    _ => {
                        return Err(LlmError::Schema(format!(
                            "field '{field}' must contain only strings"
                        )))
                    }
                }
            }
            Ok(out)
        }
        Some(_) => Err(LlmError::Schema(format!(
            "field '{field}' must be an array"
        ))),
    }
}

/// Like `string_list`, but the key itself must be present. An explicit
/// null or empty array still reads as empty; a missing key is a schema
/// violation, not an empty result.
pub fn required_list(obj: &Map<String, Value>, field: &str) -> Result<Vec<String>, LlmError> {
    if !obj.contains_key(field) {
        return Err(LlmError::Schema(format!(
            "missing required field '{field}'"
        )));
    }
    string_list(obj, field)
}

/// Accepts a string or a bare number (models disagree on which to emit for
/// years) and normalizes to the string form.
pub fn year_string(obj: &Map<String, Value>, field: &str) -> Result<Option<String>, LlmError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(LlmError::Schema(format!(
            "field '{field}' must be a string or number"
        ))),
    }
}
