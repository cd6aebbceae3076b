//! `KvService`: dispatches set/delete calls to named stores.

use kvstore_core::{KvError, Registry, StoreConfig, Value};

use crate::call::{DeleteCall, ServiceCall, SetCall};
use crate::declaration::StoreDeclaration;
use crate::summary::StoreSummary;
use crate::DOMAIN;

/// What happened to a call. Informational only; failures have already been
/// logged by the time the caller sees this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The store was mutated and a save scheduled
    Applied,
    /// No store with that name; call dropped
    StoreNotFound,
    /// Delete of a key the store does not hold; call dropped
    KeyNotFound,
    /// Call data failed validation; call dropped
    Rejected,
}

/// Owns the stores and serves the host's service calls.
pub struct KvService {
    registry: Registry,
}

impl KvService {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Open every declared store under `config`.
    pub fn setup(config: &StoreConfig, declaration: &StoreDeclaration) -> Self {
        tracing::info!(stores = ?declaration.names(), "Setting up {}", DOMAIN);
        let registry = Registry::open_all(config, declaration.names());
        tracing::info!(stores = registry.len(), "{} setup completed", DOMAIN);
        Self::new(registry)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// `set(key, value, store_name)`
    pub fn set(&self, key: &str, value: impl Into<Value>, store_name: &str) -> CallOutcome {
        self.set_call(SetCall::new(key, value, store_name))
    }

    /// `delete(key, store_name)`
    pub fn delete(&self, key: &str, store_name: &str) -> CallOutcome {
        self.delete_call(DeleteCall::new(key, store_name))
    }

    /// Dispatch a parsed call.
    pub fn call(&self, call: ServiceCall) -> CallOutcome {
        match call {
            ServiceCall::Set(set) => self.set_call(set),
            ServiceCall::Delete(delete) => self.delete_call(delete),
        }
    }

    /// Parse raw call data for `service` and dispatch it.
    pub fn handle(&self, service: &str, data: &Value) -> CallOutcome {
        match ServiceCall::parse(service, data) {
            Ok(call) => self.call(call),
            Err(e) => {
                tracing::error!(service = %service, error = %e, "Rejected service call");
                CallOutcome::Rejected
            }
        }
    }

    /// Summaries of every store, in name order.
    pub fn summaries(&self) -> Vec<StoreSummary> {
        self.registry.iter().map(StoreSummary::of).collect()
    }

    pub fn summary(&self, store_name: &str) -> Option<StoreSummary> {
        self.registry.lookup(store_name).ok().map(StoreSummary::of)
    }

    /// Wait until every store's file reflects its in-memory map.
    pub fn flush(&self) {
        self.registry.flush_all();
    }

    fn set_call(&self, call: SetCall) -> CallOutcome {
        tracing::debug!(
            store = %call.store_name,
            key = %call.key,
            value = %call.value,
            "Service call: set"
        );

        match self.registry.lookup(&call.store_name) {
            Ok(store) => {
                store.set(call.key.as_str(), call.value.clone());
                tracing::info!("Set {}={} in store {}", call.key, call.value, call.store_name);
                CallOutcome::Applied
            }
            Err(e) => {
                tracing::error!("{}", e);
                CallOutcome::StoreNotFound
            }
        }
    }

    fn delete_call(&self, call: DeleteCall) -> CallOutcome {
        tracing::debug!(store = %call.store_name, key = %call.key, "Service call: delete");

        let store = match self.registry.lookup(&call.store_name) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!("{}", e);
                return CallOutcome::StoreNotFound;
            }
        };

        match store.delete(&call.key) {
            Ok(_) => {
                tracing::info!("Deleted {} from store {}", call.key, call.store_name);
                CallOutcome::Applied
            }
            Err(KvError::KeyNotFound { .. }) => CallOutcome::KeyNotFound,
            Err(e) => {
                tracing::error!(store = %call.store_name, error = %e, "Delete failed");
                CallOutcome::Rejected
            }
        }
    }
}

impl std::fmt::Debug for KvService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvService")
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_service(names: &[&str]) -> (KvService, TempDir) {
        let dir = TempDir::new().unwrap();
        let service = KvService::setup(
            &StoreConfig::relaxed(dir.path()),
            &StoreDeclaration::new(names.iter().copied()),
        );
        (service, dir)
    }

    #[test]
    fn test_setup_default_store() {
        let dir = TempDir::new().unwrap();
        let service = KvService::setup(&StoreConfig::relaxed(dir.path()), &StoreDeclaration::default());
        assert_eq!(service.registry().names(), vec!["default".to_string()]);
    }

    #[test]
    fn test_set_and_delete() {
        let (service, _dir) = test_service(&["s"]);
        assert_eq!(service.set("k", "v", "s"), CallOutcome::Applied);
        assert_eq!(service.summary("s").unwrap().count, 1);
        assert_eq!(service.delete("k", "s"), CallOutcome::Applied);
        assert_eq!(service.delete("k", "s"), CallOutcome::KeyNotFound);
    }

    #[test]
    fn test_entity_reference_resolves() {
        let (service, _dir) = test_service(&["pantry"]);
        assert_eq!(service.set("eggs", 12, "sensor.pantry"), CallOutcome::Applied);
        let store = service.registry().lookup("pantry").unwrap();
        assert_eq!(store.get("eggs"), Some(json!(12)));
    }

    #[test]
    fn test_unknown_store_is_dropped() {
        let (service, _dir) = test_service(&["s"]);
        assert_eq!(service.set("k", 1, "other"), CallOutcome::StoreNotFound);
        assert_eq!(service.delete("k", "other"), CallOutcome::StoreNotFound);
        assert!(service.summary("s").unwrap().attributes.is_empty());
    }

    #[test]
    fn test_handle_raw_calls() {
        let (service, _dir) = test_service(&["s"]);
        let outcome = service.handle("set", &json!({"key": "k", "value": [1, 2], "store_name": "s"}));
        assert_eq!(outcome, CallOutcome::Applied);
        assert_eq!(service.summary("s").unwrap().attributes["k"], json!("[1,2]"));

        assert_eq!(service.handle("set", &json!({"key": "k"})), CallOutcome::Rejected);
        assert_eq!(
            service.handle("delete", &json!({"key": "k", "store_name": "sensor.s"})),
            CallOutcome::Applied
        );
    }

    #[test]
    fn test_summaries_in_name_order() {
        let (service, _dir) = test_service(&["b", "a"]);
        service.set("x", 1, "b");
        let summaries = service.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "a");
        assert_eq!(summaries[0].state, "0 items");
        assert_eq!(summaries[1].state, "1 items");
    }
}
