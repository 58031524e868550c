//! Evaluator parameter schema and form-value coercion.
//!
//! Config maps often come from HTML forms: arrays arrive as newline
//! separated textarea strings, booleans as `"1"`, JSON blobs as strings.
//! The schema is advisory: keys it does not name pass through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    Boolean,
    Array,
    Json,
    String,
    Symbol,
}

pub type ParamSchema = &'static [(&'static str, ParamType)];

pub fn coerce_params(raw: &Map<String, Value>, schema: ParamSchema) -> Map<String, Value> {
    raw.iter()
        .map(|(key, value)| {
            let coerced = match schema.iter().find(|(name, _)| name == key) {
                Some((_, param_type)) => coerce_value(key, value, *param_type),
                None => value.clone(),
            };
            (key.clone(), coerced)
        })
        .collect()
}

pub fn coerce_value(key: &str, value: &Value, param_type: ParamType) -> Value {
    match param_type {
        ParamType::Array => coerce_array(value),
        ParamType::Json => coerce_json(key, value),
        ParamType::Boolean => Value::Bool(is_truthy(value)),
        ParamType::Integer => coerce_integer(value),
        ParamType::String | ParamType::Symbol => match value {
            Value::String(_) | Value::Null => value.clone(),
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            other => other.clone(),
        },
    }
}

fn coerce_array(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::Array(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| Value::String(line.to_string()))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .filter(|item| !matches!(item, Value::String(s) if s.trim().is_empty()))
                .cloned()
                .collect(),
        ),
        Value::Null => Value::Array(Vec::new()),
        other => Value::Array(vec![other.clone()]),
    }
}

fn coerce_json(key: &str, value: &Value) -> Value {
    match value {
        Value::String(text) if text.trim().is_empty() => Value::Null,
        Value::String(text) => match serde_json::from_str(text) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!("Invalid JSON for evaluator param {}: {}", key, err);
                Value::Null
            }
        },
        other => other.clone(),
    }
}

fn coerce_integer(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => value.clone(),
        Value::Number(n) => n
            .as_f64()
            .map(|f| Value::from(f.round() as i64))
            .unwrap_or(Value::Null),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| trimmed.parse::<f64>().map(|f| Value::from(f.round() as i64)))
                .unwrap_or(Value::Null)
        }
        Value::Bool(b) => Value::from(i64::from(*b)),
        _ => Value::Null,
    }
}

/// `true`, `1`, `"true"` and `"1"` are truthy; everything else is not.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1) || n.as_u64() == Some(1) || n.as_f64() == Some(1.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    }
}

/// Explicit configuration always wins over class-level defaults.
pub fn merge_with_defaults(defaults: &Value, explicit: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = match defaults {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in explicit {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
