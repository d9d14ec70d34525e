//! Conversion contract between P0 wire payloads and resource state.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::InstallState;

/// A resource state model the install orchestrators can drive.
///
/// Implementations are per resource type. Every conversion is partial: a
/// `None` means the payload does not have the expected shape, and the
/// orchestrator reports it instead of falling back to a default.
pub trait ItemModel: Serialize + DeserializeOwned + Send + Sync {
    /// Identifier of the item within its component, if known.
    fn item_id(&self) -> Option<String>;

    /// Pull the item payload out of a P0 response.
    fn item_json(response: &Value) -> Option<Value> {
        response.get("item").filter(|item| !item.is_null()).cloned()
    }

    /// Build state from an item payload.
    fn from_json(id: &str, item: &Value) -> Option<Self>;

    /// Render state as the item payload P0 expects.
    fn to_json(&self) -> Option<Value>;

    /// Install state recorded in this model, if the resource tracks one.
    fn install_state(&self) -> Option<InstallState> {
        None
    }
}

/// A singleton integration configuration (no item identifier).
pub trait RootModel: Serialize + DeserializeOwned + Send + Sync {
    /// Pull the configuration payload out of a P0 response.
    fn item_json(response: &Value) -> Option<Value> {
        response.get("item").filter(|item| !item.is_null()).cloned()
    }

    /// Build state from a configuration payload.
    fn from_json(item: &Value) -> Option<Self>;

    /// Render state as the configuration payload P0 expects.
    fn to_json(&self) -> Option<Value>;
}

/// Deserialize an item payload, mapping any mismatch to `None`.
pub fn decode<T: DeserializeOwned>(item: &Value) -> Option<T> {
    serde_json::from_value(item.clone()).ok()
}

/// Serialize a wire struct, mapping any failure to `None`.
pub fn encode<T: Serialize>(item: &T) -> Option<Value> {
    serde_json::to_value(item).ok()
}

/// Shallow-merge `extra` into `base` when both are objects.
pub fn merge_object(base: Value, extra: Option<Value>) -> Value {
    match (base, extra) {
        (Value::Object(mut base), Some(Value::Object(extra))) => {
            base.extend(extra);
            Value::Object(base)
        },
        (base, _) => base,
    }
}

/// Recursively merge `update` into `base`.
///
/// Objects merge key by key; any other value in `update` replaces what
/// `base` held.
pub fn deep_merge(base: &mut Value, update: Value) {
    match (base, update) {
        (Value::Object(base), Value::Object(update)) => {
            for (key, value) in update {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    },
                }
            }
        },
        (base, update) => *base = update,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_object() {
        let merged = merge_object(json!({"label": "a", "state": "stage"}), Some(json!({"state": "x"})));
        assert_eq!(merged, json!({"label": "a", "state": "x"}));

        assert_eq!(merge_object(json!({"a": 1}), None), json!({"a": 1}));
        assert_eq!(merge_object(json!([1]), Some(json!({"a": 1}))), json!([1]));
    }

    #[test]
    fn test_deep_merge_keeps_earlier_fields() {
        let mut buffer = Value::Null;
        deep_merge(&mut buffer, json!({"item": {"label": "a", "state": "configure"}}));
        deep_merge(&mut buffer, json!({"item": {"state": "installed"}, "metadata": {}}));
        assert_eq!(
            buffer,
            json!({"item": {"label": "a", "state": "installed"}, "metadata": {}})
        );

        deep_merge(&mut buffer, json!({"item": null}));
        assert_eq!(buffer["item"], Value::Null);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        #[derive(serde::Deserialize)]
        struct Wire {
            #[allow(dead_code)]
            label: String,
        }
        assert!(decode::<Wire>(&json!({"label": 5})).is_none());
        assert!(decode::<Wire>(&json!({"label": "ok"})).is_some());
    }
}
