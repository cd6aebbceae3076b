//! Registry: store name -> Store
//!
//! Owned by whoever dispatches operations. There is no process-wide
//! instance; two registries never share stores.

use std::fs;

use hashbrown::HashMap;

use crate::config::StoreConfig;
use crate::error::{KvError, KvResult};
use crate::platform_durability::check_writable;
use crate::store::Store;

/// Maps store names to the stores that own them.
#[derive(Default)]
pub struct Registry {
    stores: HashMap<String, Store>,
}

impl Registry {
    pub fn new() -> Self {
        Self { stores: HashMap::new() }
    }

    /// Open every named store under `config` and register it.
    ///
    /// The config root must exist and be writable; otherwise nothing is
    /// opened. Duplicate names are opened once. Names that fail validation
    /// are logged and skipped.
    pub fn open_all<S: AsRef<str>>(config: &StoreConfig, names: &[S]) -> Self {
        let mut registry = Self::new();

        if let Err(e) = check_config_root(config) {
            tracing::error!(error = %e, "Config directory unusable, no stores opened");
            return registry;
        }

        for name in names {
            let name = name.as_ref();
            if registry.contains(name) {
                tracing::debug!(store = %name, "Store declared twice, keeping the first");
                continue;
            }
            match Store::open(name, config) {
                Ok(store) => {
                    registry.register(name, store);
                    tracing::info!(store = %name, "Registered store");
                }
                Err(e) => tracing::error!(store = %name, error = %e, "Skipping store"),
            }
        }

        if registry.is_empty() {
            tracing::warn!("No stores were created");
        }
        registry
    }

    /// Insert or replace the store registered under `name`.
    ///
    /// Returns the replaced store, whose save thread drains and stops when
    /// it is dropped.
    pub fn register(&mut self, name: impl Into<String>, store: Store) -> Option<Store> {
        self.stores.insert(name.into(), store)
    }

    /// Find a store by name.
    pub fn lookup(&self, name: &str) -> KvResult<&Store> {
        self.stores.get(name).ok_or_else(|| KvError::StoreNotFound {
            name: name.to_string(),
            available: self.names(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Stores in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Store> {
        let mut stores: Vec<&Store> = self.stores.values().collect();
        stores.sort_by(|a, b| a.name().cmp(b.name()));
        stores.into_iter()
    }

    /// Wait for every store's pending saves. Errors are logged per store.
    pub fn flush_all(&self) {
        for store in self.iter() {
            if let Err(e) = store.flush() {
                tracing::error!(store = %store.name(), error = %e, "Error flushing store");
            }
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("stores", &self.names())
            .finish()
    }
}

fn check_config_root(config: &StoreConfig) -> KvResult<()> {
    config.validate().map_err(KvError::InvalidConfig)?;

    let root = config.config_root();
    let metadata = fs::metadata(root).map_err(|e| KvError::Io {
        path: Some(root.to_path_buf()),
        kind: e.kind(),
        message: format!("Config directory does not exist: {}", e),
    })?;

    if !metadata.is_dir() {
        return Err(KvError::Io {
            path: Some(root.to_path_buf()),
            kind: std::io::ErrorKind::InvalidInput,
            message: "Config path is not a directory".to_string(),
        });
    }
    check_writable(root).map_err(|e| KvError::Io {
        path: Some(root.to_path_buf()),
        kind: e.kind(),
        message: format!("Config directory is not writable: {}", e),
    })
}
