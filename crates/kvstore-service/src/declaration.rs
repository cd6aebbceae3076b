//! Store declaration: which stores exist
//!
//! Read once at startup from the host configuration. Accepted shapes:
//! - absent, `null`, `""` or `[]`: the single store `default`
//! - a bare string: one store
//! - a list: one store per item, in order
//! - config entry data `{"stores": ...}`: whatever `stores` holds
//!
//! Anything else is a configuration error and falls back to `default`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::DEFAULT_STORE_NAME;

/// Ordered store names declared by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StoreDeclaration {
    names: Vec<String>,
}

impl StoreDeclaration {
    /// Declaration naming exactly `names`, or `default` when empty.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            Self::default()
        } else {
            Self { names }
        }
    }

    /// Interpret the host's configuration value for this integration.
    pub fn from_config(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => {
                tracing::debug!("No store configuration found, using default");
                Self::default()
            }
            Some(Value::String(name)) => {
                if name.is_empty() {
                    tracing::debug!("Store configuration is empty, using default");
                }
                Self::new([name.as_str()])
            }
            Some(v @ (Value::Number(_) | Value::Bool(_))) => {
                tracing::debug!(config = %v, "Store configuration is a scalar, converting");
                Self::new([v.to_string()])
            }
            Some(Value::Array(items)) => {
                if items.is_empty() {
                    tracing::debug!("Store configuration is empty, using default");
                }
                Self::new(items.iter().filter_map(item_name))
            }
            Some(Value::Object(entry)) => match entry.get("stores") {
                Some(stores) => Self::from_config(Some(stores)),
                None => {
                    tracing::info!(config = %serde_json::Value::Object(entry.clone()), "Unrecognized store configuration, using default");
                    Self::default()
                }
            },
        }
    }

    /// Interpret config entry data, which keeps the names under `stores`.
    pub fn from_entry_data(data: &Value) -> Self {
        Self::from_config(data.get("stores"))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Default for StoreDeclaration {
    fn default() -> Self {
        Self { names: vec![DEFAULT_STORE_NAME.to_string()] }
    }
}

impl<'de> Deserialize<'de> for StoreDeclaration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(Self::from_config(value.as_ref()))
    }
}

fn item_name(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(item.to_string()),
        other => {
            tracing::info!(item = %other, "Ignoring store declaration item");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(decl: &StoreDeclaration) -> Vec<&str> {
        decl.names().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_missing_uses_default() {
        assert_eq!(names(&StoreDeclaration::from_config(None)), vec!["default"]);
        assert_eq!(names(&StoreDeclaration::from_config(Some(&json!(null)))), vec!["default"]);
        assert_eq!(names(&StoreDeclaration::from_config(Some(&json!([])))), vec!["default"]);
        assert_eq!(names(&StoreDeclaration::from_config(Some(&json!("")))), vec!["default"]);
    }

    #[test]
    fn test_bare_string_is_single_store() {
        let decl = StoreDeclaration::from_config(Some(&json!("pantry")));
        assert_eq!(names(&decl), vec!["pantry"]);
    }

    #[test]
    fn test_list_keeps_order() {
        let decl = StoreDeclaration::from_config(Some(&json!(["b", "a", 3])));
        assert_eq!(names(&decl), vec!["b", "a", "3"]);
    }

    #[test]
    fn test_entry_data() {
        let decl = StoreDeclaration::from_entry_data(&json!({"stores": ["x", "y"]}));
        assert_eq!(names(&decl), vec!["x", "y"]);
        let decl = StoreDeclaration::from_entry_data(&json!({}));
        assert_eq!(names(&decl), vec!["default"]);
    }

    #[test]
    fn test_unrecognized_object_uses_default() {
        let decl = StoreDeclaration::from_config(Some(&json!({"pantry": true})));
        assert_eq!(names(&decl), vec!["default"]);
    }

    #[test]
    fn test_deserialize_from_json() {
        #[derive(Deserialize)]
        struct HostConfig {
            #[serde(default)]
            kv_store: StoreDeclaration,
        }

        let cfg: HostConfig = serde_json::from_str(r#"{"kv_store": "garage"}"#).unwrap();
        assert_eq!(names(&cfg.kv_store), vec!["garage"]);
        let cfg: HostConfig = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(names(&cfg.kv_store), vec!["default"]);
        let cfg: HostConfig = serde_json::from_str(r#"{"kv_store": null}"#).unwrap();
        assert_eq!(names(&cfg.kv_store), vec!["default"]);
    }
}
