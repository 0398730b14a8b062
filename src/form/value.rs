//! Helpers for JSON-shaped accumulated values.
//!
//! The orchestrator itself never inspects the value; these cover the common
//! case where every step contributes a slice of one JSON object.

use serde_json::{Map, Value};

/// Shallow object merge: keys in `patch` overwrite keys in `base`.
///
/// A non-object `base` is replaced by an empty object first, and a non-object
/// `patch` replaces the value wholesale.
pub fn merge_fields(base: &Value, patch: &Value) -> Value {
    let Value::Object(patch_fields) = patch else {
        return patch.clone();
    };

    let mut merged = match base {
        Value::Object(fields) => fields.clone(),
        _ => Map::new(),
    };
    for (key, value) in patch_fields {
        merged.insert(key.clone(), value.clone());
    }
    Value::Object(merged)
}

/// True when every named field is present and non-null
pub fn has_fields<S: AsRef<str>>(value: &Value, fields: &[S]) -> bool {
    fields
        .iter()
        .all(|field| value.get(field.as_ref()).is_some_and(|v| !v.is_null()))
}
