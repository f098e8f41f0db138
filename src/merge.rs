//! Deep merge of OpenAPI fragments.
//!
//! Fragments are folded one after another into a single document. The first
//! fragment to set a scalar wins, sequences are unioned in order and mappings
//! are merged key by key.

use serde_json::{Map, Value};

/// Merges `source` into `target` in place.
///
/// Rules per key of `source`:
///
/// - missing in `target`: the value is moved in as-is
/// - `target` holds a sequence: each element of `source` (a scalar is treated
///   as a one-element sequence) is appended unless an equal element exists
/// - both hold mappings: merged recursively
/// - anything else: `target` keeps its value
pub fn merge(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match target.get_mut(&key) {
            None => {
                target.insert(key, value);
            }
            Some(Value::Array(existing)) => {
                let incoming = match value {
                    Value::Array(items) => items,
                    other => vec![other],
                };
                for item in incoming {
                    if !existing.contains(&item) {
                        existing.push(item);
                    }
                }
            }
            Some(Value::Object(existing)) => {
                if let Value::Object(incoming) = value {
                    merge(existing, incoming);
                }
            }
            Some(_) => {}
        }
    }
}
