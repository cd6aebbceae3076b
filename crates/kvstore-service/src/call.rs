//! Service calls: parsing and normalization
//!
//! A call arrives as a JSON object of already-rendered values. `set` takes
//! `key`, `value` and `store_name`; `delete` takes `key` and `store_name`.
//! Unknown fields are rejected, like the host's own schema validation.

use kvstore_core::{KvError, KvResult};
use serde_json::{Map, Value};

use crate::{ATTR_KEY, ATTR_STORE_NAME, ATTR_VALUE, ENTITY_PREFIX, SERVICE_DELETE, SERVICE_SET};

/// Strip the entity prefix from a store reference.
///
/// `sensor.pantry` and `pantry` both name the store `pantry`.
pub fn normalize_store_name(raw: &str) -> &str {
    raw.strip_prefix(ENTITY_PREFIX).unwrap_or(raw)
}

/// Flatten a value into something a store keeps as-is.
///
/// Scalars and strings pass through. Arrays and objects become their compact
/// JSON text.
pub fn render_value(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar,
    }
}

/// `set(key, value, store_name)`
#[derive(Debug, Clone, PartialEq)]
pub struct SetCall {
    pub key: String,
    pub value: Value,
    /// Bare store name
    pub store_name: String,
}

impl SetCall {
    pub fn new(key: impl Into<String>, value: impl Into<Value>, store_name: &str) -> Self {
        Self {
            key: key.into(),
            value: render_value(value.into()),
            store_name: normalize_store_name(store_name).to_string(),
        }
    }
}

/// `delete(key, store_name)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCall {
    pub key: String,
    /// Bare store name
    pub store_name: String,
}

impl DeleteCall {
    pub fn new(key: impl Into<String>, store_name: &str) -> Self {
        Self {
            key: key.into(),
            store_name: normalize_store_name(store_name).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Set(SetCall),
    Delete(DeleteCall),
}

impl ServiceCall {
    /// Parse raw call data for `service` (`set` or `delete`).
    pub fn parse(service: &str, data: &Value) -> KvResult<Self> {
        let fields = data
            .as_object()
            .ok_or_else(|| KvError::InvalidCall(format!("call data must be an object, got {}", data)))?;

        match service {
            SERVICE_SET => {
                reject_unknown(fields, &[ATTR_KEY, ATTR_VALUE, ATTR_STORE_NAME])?;
                let key = string_field(fields, ATTR_KEY)?;
                let value = fields
                    .get(ATTR_VALUE)
                    .cloned()
                    .ok_or_else(|| missing(ATTR_VALUE))?;
                let store_name = string_field(fields, ATTR_STORE_NAME)?;
                Ok(ServiceCall::Set(SetCall::new(key, value, &store_name)))
            }
            SERVICE_DELETE => {
                reject_unknown(fields, &[ATTR_KEY, ATTR_STORE_NAME])?;
                let key = string_field(fields, ATTR_KEY)?;
                let store_name = string_field(fields, ATTR_STORE_NAME)?;
                Ok(ServiceCall::Delete(DeleteCall::new(key, &store_name)))
            }
            other => Err(KvError::InvalidCall(format!("unknown service {}", other))),
        }
    }

    pub fn store_name(&self) -> &str {
        match self {
            ServiceCall::Set(call) => &call.store_name,
            ServiceCall::Delete(call) => &call.store_name,
        }
    }
}

fn missing(field: &str) -> KvError {
    KvError::InvalidCall(format!("required key not provided: {}", field))
}

/// Strings pass through; numbers and booleans are coerced to their text.
fn string_field(fields: &Map<String, Value>, field: &str) -> KvResult<String> {
    match fields.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.to_string()),
        Some(other) => Err(KvError::InvalidCall(format!(
            "expected a string for {}, got {}",
            field, other
        ))),
        None => Err(missing(field)),
    }
}

fn reject_unknown(fields: &Map<String, Value>, allowed: &[&str]) -> KvResult<()> {
    match fields.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(extra) => Err(KvError::InvalidCall(format!("extra keys not allowed: {}", extra))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_store_name() {
        assert_eq!(normalize_store_name("sensor.pantry"), "pantry");
        assert_eq!(normalize_store_name("pantry"), "pantry");
        // Only the first separator belongs to the prefix
        assert_eq!(normalize_store_name("sensor.a.b"), "a.b");
        assert_eq!(normalize_store_name("light.pantry"), "light.pantry");
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(json!(12)), json!(12));
        assert_eq!(render_value(json!("twelve")), json!("twelve"));
        assert_eq!(render_value(json!(null)), json!(null));
        assert_eq!(render_value(json!([1, 2])), json!("[1,2]"));
        assert_eq!(render_value(json!({"a": 1})), json!("{\"a\":1}"));
    }

    #[test]
    fn test_parse_set() {
        let call = ServiceCall::parse(
            "set",
            &json!({"key": "eggs", "value": 12, "store_name": "sensor.pantry"}),
        )
        .unwrap();
        assert_eq!(call, ServiceCall::Set(SetCall::new("eggs", 12, "pantry")));
        assert_eq!(call.store_name(), "pantry");
    }

    #[test]
    fn test_parse_set_coerces_numeric_key() {
        let call = ServiceCall::parse("set", &json!({"key": 7, "value": "x", "store_name": "s"})).unwrap();
        match call {
            ServiceCall::Set(set) => assert_eq!(set.key, "7"),
            other => panic!("Expected set call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_set_accepts_null_value() {
        let call = ServiceCall::parse("set", &json!({"key": "k", "value": null, "store_name": "s"})).unwrap();
        assert_eq!(call, ServiceCall::Set(SetCall::new("k", Value::Null, "s")));
    }

    #[test]
    fn test_parse_delete() {
        let call = ServiceCall::parse("delete", &json!({"key": "milk", "store_name": "pantry"})).unwrap();
        assert_eq!(call, ServiceCall::Delete(DeleteCall::new("milk", "pantry")));
    }

    #[test]
    fn test_parse_rejects_bad_data() {
        assert!(ServiceCall::parse("set", &json!({"key": "k", "store_name": "s"})).is_err());
        assert!(ServiceCall::parse("set", &json!({"key": "k", "value": 1})).is_err());
        assert!(ServiceCall::parse("delete", &json!({"key": "k", "value": 1, "store_name": "s"})).is_err());
        assert!(ServiceCall::parse("delete", &json!({"key": ["k"], "store_name": "s"})).is_err());
        assert!(ServiceCall::parse("delete", &json!("k")).is_err());
        assert!(matches!(
            ServiceCall::parse("clear", &json!({})),
            Err(KvError::InvalidCall(_))
        ));
    }
}
