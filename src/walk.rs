//! Generic traversal over `serde_json::Value` trees.

use serde_json::Value;

/// Calls `visit` for every value stored under `key` anywhere in `root`.
///
/// Objects are walked in key order and arrays in index order. A matched value
/// is handed to `visit` and not descended into.
pub fn for_each_keyed<'a, F>(root: &'a Value, key: &str, visit: &mut F)
where
    F: FnMut(&'a Value),
{
    match root {
        Value::Object(map) => {
            for (k, v) in map {
                if k == key {
                    visit(v);
                } else {
                    for_each_keyed(v, key, visit);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                for_each_keyed(item, key, visit);
            }
        }
        _ => {}
    }
}

/// Collects the distinct schema names referenced through
/// `$ref: "#/components/schemas/<Name>"`, in discovery order.
pub fn schema_refs(root: &Value) -> Vec<String> {
    const PREFIX: &str = "#/components/schemas/";

    let mut names: Vec<String> = Vec::new();
    for_each_keyed(root, "$ref", &mut |value| {
        let name = value.as_str().and_then(|s| s.strip_prefix(PREFIX));
        if let Some(name) = name {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    });
    names
}
