//! Field-by-field merging of configuration tiers.

use serde_json::Value;

/// Apply one configuration tier on top of the merged result so far.
///
/// Objects merge key by key; any other value in `layer` replaces what is in
/// `merged` (arrays included). A null in `layer` means "not specified" and
/// leaves `merged` alone.
///
/// # Example
/// ```
/// use serde_json::json;
/// use project_board::config::merge_layer;
///
/// let mut merged = json!({ "board": { "dir": "boards", "lock_timeout_secs": 15.0 } });
/// merge_layer(&mut merged, json!({ "board": { "lock_timeout_secs": 30.0 } }));
/// assert_eq!(merged, json!({ "board": { "dir": "boards", "lock_timeout_secs": 30.0 } }));
/// ```
pub fn merge_layer(merged: &mut Value, layer: Value) {
    match (merged, layer) {
        (_, Value::Null) => {}
        (Value::Object(fields), Value::Object(layer_fields)) => {
            for (key, value) in layer_fields {
                match fields.get_mut(&key) {
                    Some(slot) => merge_layer(slot, value),
                    None => {
                        fields.insert(key, value);
                    }
                }
            }
        }
        (slot, layer) => *slot = layer,
    }
}
