//! Path-based access into opaque object trees.
//!
//! Reads go through `Value::pointer`; mutation navigates with
//! `as_object_mut`/`as_array_mut` so missing or mistyped nodes are simply
//! skipped rather than erroring.

use serde_json::{Map, Value};

use crate::Object;

/// `kind` of the object, empty when absent.
pub fn kind(obj: &Object) -> &str {
    obj.get("kind").and_then(Value::as_str).unwrap_or("")
}

/// `metadata.name` of the object, empty when absent.
pub fn name(obj: &Object) -> &str {
    obj.pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// "Kind/name" identifier used in warnings and conflicts.
pub fn identifier(obj: &Object) -> String {
    format!("{}/{}", kind(obj), name(obj))
}

/// String at a JSON-pointer path.
pub fn str_at<'a>(obj: &'a Object, pointer: &str) -> Option<&'a str> {
    obj.pointer(pointer).and_then(Value::as_str)
}

/// Sequence at a JSON-pointer path.
pub fn seq_at<'a>(obj: &'a Object, pointer: &str) -> Option<&'a Vec<Value>> {
    obj.pointer(pointer).and_then(Value::as_array)
}

/// Mutable mapping at a JSON-pointer path.
pub fn map_at_mut<'a>(obj: &'a mut Object, pointer: &str) -> Option<&'a mut Map<String, Value>> {
    obj.pointer_mut(pointer).and_then(Value::as_object_mut)
}

/// Remove `key` from the mapping at `pointer`; returns the removed value.
pub fn remove_at(obj: &mut Object, pointer: &str, key: &str) -> Option<Value> {
    map_at_mut(obj, pointer)?.remove(key)
}

/// Numeric value widened to i64. JSON decoders surface numbers as either
/// integers or floats; ports must accept both.
pub fn as_i64_lenient(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
}
