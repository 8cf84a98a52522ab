//! Deep copies of JSON-like state.

use serde_json::{Map, Value};

/// Produce an independent deep copy of `value`.
///
/// Scalars are copied directly. Arrays whose elements are all scalars are
/// copied element by element without recursing; as soon as one element is a
/// container, every element goes through the recursive path. The whole array
/// is scanned to make that decision, so a scalar in the first slot never
/// hides a nested object further along.
pub fn deep_clone(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::Number(n) => Value::Number(n.clone()),
        Value::String(s) => Value::String(s.clone()),
        Value::Array(items) => Value::Array(clone_array(items)),
        Value::Object(map) => Value::Object(clone_object(map)),
    }
}

fn clone_array(items: &[Value]) -> Vec<Value> {
    if items.iter().all(is_scalar) {
        return items.to_vec();
    }
    items.iter().map(deep_clone).collect()
}

fn clone_object(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        out.insert(key.clone(), deep_clone(value));
    }
    out
}

/// True for values that hold no nested containers.
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}
