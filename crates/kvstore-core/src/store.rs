//! Store — one named key-value namespace and its backing file.
//!
//! The in-memory map is the source of truth for reads. Every mutation
//! updates the map synchronously and hands a snapshot to the store's save
//! queue, so callers never wait for the disk.
//!
//! **Read path**: RAM only, concurrent readers via RwLock
//! **Write path**: RAM under the write lock, snapshot enqueued under the same lock
//! **Background**: the save thread rewrites the file from each snapshot, in order

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::{KvError, KvResult};
use crate::save_queue::{SaveQueue, SaveStats};
use crate::snapshot_file::{read_snapshot, Snapshot};

/// Check that `name` can be used as a bare store name.
///
/// The name ends up inside a file name, so anything that could climb out of
/// the storage directory is rejected.
pub fn validate_store_name(name: &str) -> KvResult<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.contains(['/', '\\']) {
        Some("name contains a path separator")
    } else if name == "." || name == ".." {
        Some("name is a relative path component")
    } else if name.contains('\0') {
        Some("name contains a NUL byte")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(KvError::InvalidStoreName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// A named key-value store persisted as one JSON file.
///
/// All public methods take `&self`. Readers share the map's read lock;
/// writers hold the write lock only for the map update and the enqueue.
pub struct Store {
    name: String,
    file_path: PathBuf,
    /// In-memory map
    data: RwLock<HashMap<String, Value>>,
    /// Bumped on every change to `data`
    revision: AtomicU64,
    /// Background writer for `file_path`
    saver: SaveQueue,
}

impl Store {
    /// Create a store without touching its file.
    ///
    /// Validates the name, derives the file path from `config` and starts the
    /// save thread. The map starts empty; call `load` to adopt the file.
    pub fn new(name: &str, config: &StoreConfig) -> KvResult<Self> {
        validate_store_name(name)?;
        config.validate().map_err(KvError::InvalidConfig)?;

        let file_path = config.store_path(name);
        let saver = SaveQueue::start(name, file_path.clone(), config.durable_writes)?;

        tracing::info!(store = %name, path = %file_path.display(), "Initializing KV store");

        Ok(Self {
            name: name.to_string(),
            file_path,
            data: RwLock::new(HashMap::new()),
            revision: AtomicU64::new(0),
            saver,
        })
    }

    /// Create a store and load its file.
    pub fn open(name: &str, config: &StoreConfig) -> KvResult<Self> {
        let store = Self::new(name, config)?;
        store.load();
        Ok(store)
    }

    /// Replace the in-memory map with the contents of the backing file.
    ///
    /// A missing file yields an empty map and a save that creates the file.
    /// A file that cannot be read or parsed yields an empty map and an error
    /// log; the file is left alone until the next save overwrites it.
    pub fn load(&self) {
        match read_snapshot(&self.file_path) {
            Ok(Some(map)) => {
                tracing::debug!(store = %self.name, entries = map.len(), "Loaded data");
                self.replace_all(map);
            }
            Ok(None) => {
                tracing::debug!(store = %self.name, "No data file, creating an empty one");
                self.replace_all(HashMap::new());
                self.save();
                if let Err(e) = self.flush() {
                    tracing::error!(store = %self.name, error = %e, "Error creating data file");
                }
            }
            Err(e) => {
                tracing::error!(store = %self.name, error = %e, "Error loading data");
                self.replace_all(HashMap::new());
            }
        }
    }

    /// Insert or overwrite `key`, then schedule a save.
    ///
    /// The new value is visible to readers as soon as this returns; the save
    /// completes later on the store's save thread.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        tracing::debug!(store = %self.name, key = %key, value = %value, "Setting value");

        let mut data = self.data.write();
        data.insert(key, value);
        self.enqueue_locked(&data);
    }

    /// Remove `key`, then schedule a save.
    ///
    /// Returns the removed value. A missing key is logged and reported as
    /// `KvError::KeyNotFound`; nothing is saved in that case.
    pub fn delete(&self, key: &str) -> KvResult<Value> {
        let mut data = self.data.write();
        let removed = data.remove(key);
        match removed {
            Some(old) => {
                self.enqueue_locked(&data);
                drop(data);
                tracing::debug!(store = %self.name, key = %key, "Deleted key");
                Ok(old)
            }
            None => {
                drop(data);
                tracing::warn!(store = %self.name, key = %key, "Key not found");
                Err(KvError::KeyNotFound {
                    store: self.name.clone(),
                    key: key.to_string(),
                })
            }
        }
    }

    /// Schedule a save of the current map. The file is replaced as a whole.
    pub fn save(&self) {
        let data = self.data.read();
        self.enqueue_snapshot(Snapshot::capture(&data, self.revision()));
    }

    /// Block until every save scheduled so far has reached the file.
    pub fn flush(&self) -> KvResult<()> {
        self.saver.flush()
    }

    /// Get value for key.
    pub fn get(&self, key: &str) -> Option<Value> {
        let data = self.data.read();
        data.get(key).cloned()
    }

    /// Check if key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        let data = self.data.read();
        data.contains_key(key)
    }

    /// Number of key-value pairs in memory.
    pub fn len(&self) -> usize {
        let data = self.data.read();
        data.len()
    }

    /// Returns true if the store has no entries.
    pub fn is_empty(&self) -> bool {
        let data = self.data.read();
        data.is_empty()
    }

    /// Full key-value map, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let data = self.data.read();
        data.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Increases on every change to the in-memory map.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// True while saves are queued but not yet applied.
    pub fn is_dirty(&self) -> bool {
        self.saver.stats().pending() > 0
    }

    pub fn save_stats(&self) -> &SaveStats {
        self.saver.stats()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn replace_all(&self, map: HashMap<String, Value>) {
        let mut data = self.data.write();
        *data = map;
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    /// Bump the revision and enqueue a snapshot. Must be called with the
    /// write lock held so that queue order matches mutation order.
    fn enqueue_locked(&self, data: &HashMap<String, Value>) {
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        self.enqueue_snapshot(Snapshot::capture(data, revision));
    }

    fn enqueue_snapshot(&self, snapshot: Snapshot) {
        if let Err(e) = self.saver.enqueue(snapshot) {
            tracing::error!(store = %self.name, error = %e, "Error scheduling save");
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("file_path", &self.file_path)
            .field("entries", &self.len())
            .field("revision", &self.revision())
            .finish()
    }
}
