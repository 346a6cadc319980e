//! Field access and comparison over the JSON form of entities.

use crate::error::{Result, StoreError};
use crate::types::Entity;
use serde_json::{Map, Value};
use std::cmp::Ordering;

static NULL: Value = Value::Null;

/// Serialize an entity into its object form.
pub fn to_object<T: Entity>(entity: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::NotAnObject(type_name(&other).to_string())),
    }
}

/// Decode an object back into an entity.
pub fn from_object<T: Entity>(object: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(object))
        .map_err(|e| StoreError::Deserialization(e.to_string()))
}

/// Field of an object; missing fields read as `null`.
pub fn field<'a>(object: &'a Map<String, Value>, name: &str) -> &'a Value {
    object.get(name).unwrap_or(&NULL)
}

/// Storage key for an identity value.
///
/// Returns `None` for values that do not carry an identity: `null`, empty
/// strings, arrays and objects.
pub fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Equality used by `eq`, `neq` and `in`. Numbers compare by value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Ordering between two scalars of the same kind.
///
/// Mixed kinds and non-scalars are incomparable, so range filters over them
/// never match.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Total order used for sorting.
///
/// Same-kind scalars use [`compare_values`]; everything else is ranked by
/// kind (null < bool < number < string < array < object) and otherwise tied.
pub fn sort_order(a: &Value, b: &Value) -> Ordering {
    compare_values(a, b).unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b)))
}

/// Text form used by `contains`.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
