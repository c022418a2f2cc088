//! Coercion helpers over dynamic values.
//!
//! Flows carry `serde_json::Value` payloads; these helpers pin down the
//! coercions the node semantics rely on (branch conditions, switch case
//! matching, context threading).

use serde_json::{Map, Value};

/// Key under which a node's result travels to its downstream neighbours.
pub const RESULT_KEY: &str = "_result";

/// Key under which `call_flow` hands the parent context to a sub-flow.
pub const PARENT_INPUT_KEY: &str = "_parentInput";

/// Boolean coercion for branch conditions: null, false, 0 and the empty
/// string are false; everything else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form used for switch case matching and log interpolation:
/// bare strings stay unquoted, everything else renders as JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Normalize a caller-supplied payload into a context object.
pub fn into_context(input: Value) -> Value {
    match input {
        Value::Object(_) => input,
        Value::Null => Value::Object(Map::new()),
        other => {
            let mut map = Map::new();
            map.insert("payload".to_string(), other);
            Value::Object(map)
        }
    }
}

/// Context handed to a node's downstream neighbours: the upstream context
/// with `_result` replaced by the node's result.
pub fn with_result(context: &Value, result: Value) -> Value {
    let mut map = match context {
        Value::Object(m) => m.clone(),
        _ => Map::new(),
    };
    map.insert(RESULT_KEY.to_string(), result);
    Value::Object(map)
}

/// A node's effective input: the upstream `_result` when present, otherwise
/// the whole context (the trigger payload at the head of a flow).
pub fn incoming(context: &Value) -> Value {
    context
        .get(RESULT_KEY)
        .cloned()
        .unwrap_or_else(|| context.clone())
}
