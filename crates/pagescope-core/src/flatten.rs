//! Dotted-path flattening of nested JSON values.

use serde_json::{Map, Value};

/// Single-level mapping from dotted paths to leaf values, in source key order.
pub type FlatMap = Map<String, Value>;

/// Flatten `value` into a single-level mapping keyed by dot-joined paths.
///
/// Objects and arrays are descended into (array elements are keyed by their
/// index). Scalars and `null` terminate a path. A scalar root with an empty
/// prefix has no keys to iterate and yields an empty mapping.
///
/// ```
/// use pagescope_core::flatten::flatten;
/// use serde_json::json;
///
/// let flat = flatten(&json!({"a": {"b": 1, "c": {"d": 2}}}), "");
/// assert_eq!(flat["a.b"], json!(1));
/// assert_eq!(flat["a.c.d"], json!(2));
/// ```
pub fn flatten(value: &Value, prefix: &str) -> FlatMap {
    let mut out = FlatMap::new();
    match value {
        Value::Object(_) | Value::Array(_) => flatten_into(value, prefix, &mut out),
        scalar if !prefix.is_empty() => {
            out.insert(prefix.to_string(), scalar.clone());
        }
        _ => {}
    }
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut FlatMap) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                visit(child, &join(prefix, key), out);
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                visit(child, &join(prefix, &idx.to_string()), out);
            }
        }
        _ => {}
    }
}

fn visit(child: &Value, path: &str, out: &mut FlatMap) {
    match child {
        Value::Object(_) | Value::Array(_) => flatten_into(child, path, out),
        leaf => {
            out.insert(path.to_string(), leaf.clone());
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Follow a dotted path through `value`, treating array indices as keys.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
