//! Snapshot files: the on-disk form of one store
//!
//! A store file is a single flat JSON object mapping string keys to JSON
//! values. It is never patched; every save rewrites it whole using the
//! atomic rename pattern:
//! 1. Create the parent directory (recursive, idempotent)
//! 2. Write the serialized snapshot to `<file>.tmp`
//! 3. durable_sync the temp file (durable writes only)
//! 4. Rename the temp file over the store file (atomic on POSIX)
//! 5. durable_sync the parent directory (durable writes only)
//!
//! A crash before step 4 leaves the previous file intact and an orphaned
//! temp file, which the next save truncates.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use serde_json::Value;

use crate::error::{KvError, KvResult};
use crate::platform_durability::{durable_sync, sync_dir};

/// Immutable copy of a store's map, captured when a save is dispatched.
///
/// Entries are key-ordered so that saving the same map twice produces
/// byte-identical files.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Store revision at capture time
    pub revision: u64,
    pub entries: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Capture the given map at `revision`.
    pub fn capture(data: &HashMap<String, Value>, revision: u64) -> Self {
        Self {
            revision,
            entries: data.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialized file contents.
    pub fn to_bytes(&self) -> KvResult<Vec<u8>> {
        serde_json::to_vec(&self.entries).map_err(|e| KvError::Io {
            path: None,
            kind: ErrorKind::InvalidData,
            message: format!("Failed to serialize snapshot: {}", e),
        })
    }
}

/// Temp file used while replacing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read a store file.
///
/// Returns `Ok(None)` when the file does not exist. Anything that is not a
/// flat JSON object with string keys is a `KvError::Parse`.
pub fn read_snapshot(path: &Path) -> KvResult<Option<HashMap<String, Value>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(KvError::Io {
                path: Some(path.to_path_buf()),
                kind: e.kind(),
                message: format!("Failed to read store file: {}", e),
            })
        }
    };

    let map: HashMap<String, Value> = serde_json::from_slice(&bytes).map_err(|e| KvError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(Some(map))
}

/// Replace the store file at `path` with `snapshot`.
///
/// Returns the number of bytes written.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot, durable: bool) -> KvResult<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| KvError::Io {
            path: Some(parent.to_path_buf()),
            kind: e.kind(),
            message: format!("Failed to create storage directory: {}", e),
        })?;
    }

    let bytes = snapshot.to_bytes()?;
    let tmp_path = temp_path(path);

    {
        let mut tmp = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| KvError::Io {
                path: Some(tmp_path.clone()),
                kind: e.kind(),
                message: format!("Failed to create temp file: {}", e),
            })?;

        tmp.write_all(&bytes).map_err(|e| KvError::Io {
            path: Some(tmp_path.clone()),
            kind: e.kind(),
            message: format!("Failed to write snapshot: {}", e),
        })?;

        if durable {
            durable_sync(&tmp).map_err(|e| KvError::Io {
                path: Some(tmp_path.clone()),
                kind: e.kind(),
                message: format!("Failed to sync snapshot: {}", e),
            })?;
        }
    }

    fs::rename(&tmp_path, path).map_err(|e| KvError::Io {
        path: Some(path.to_path_buf()),
        kind: e.kind(),
        message: format!("Failed to replace store file: {}", e),
    })?;

    if durable {
        if let Some(parent) = path.parent() {
            sync_dir(parent).map_err(|e| KvError::Io {
                path: Some(parent.to_path_buf()),
                kind: e.kind(),
                message: format!("Failed to sync storage directory: {}", e),
            })?;
        }
    }

    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn map_of(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let result = read_snapshot(&dir.path().join("kv_store_x.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_write_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".storage").join("deeper").join("kv_store_a.json");
        let snapshot = Snapshot::capture(&map_of(&[("eggs", json!(12))]), 1);

        write_snapshot(&path, &snapshot, true).unwrap();

        let contents: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(contents, json!({"eggs": 12}));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_write_replaces_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv_store_a.json");

        let first = Snapshot::capture(&map_of(&[("a", json!(1)), ("b", json!(2))]), 1);
        write_snapshot(&path, &first, false).unwrap();
        let second = Snapshot::capture(&map_of(&[("c", json!("three"))]), 2);
        write_snapshot(&path, &second, false).unwrap();

        let reread = read_snapshot(&path).unwrap().unwrap();
        assert_eq!(reread, map_of(&[("c", json!("three"))]));
    }

    #[test]
    fn test_write_is_byte_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv_store_a.json");
        let data = map_of(&[("z", json!(true)), ("a", json!(null)), ("m", json!(1.5))]);

        write_snapshot(&path, &Snapshot::capture(&data, 1), false).unwrap();
        let first = fs::read(&path).unwrap();
        write_snapshot(&path, &Snapshot::capture(&data, 1), false).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, br#"{"a":null,"m":1.5,"z":true}"#.to_vec());
    }

    #[test]
    fn test_read_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv_store_a.json");
        fs::write(&path, b"[1, 2, 3]").unwrap();

        match read_snapshot(&path) {
            Err(KvError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv_store_a.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(read_snapshot(&path), Err(KvError::Parse { .. })));
    }

    #[test]
    fn test_stale_temp_file_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv_store_a.json");
        fs::write(temp_path(&path), b"leftover from a crash, much longer than the new data").unwrap();

        write_snapshot(&path, &Snapshot::capture(&map_of(&[("k", json!("v"))]), 1), false).unwrap();

        assert_eq!(fs::read(&path).unwrap(), br#"{"k":"v"}"#.to_vec());
    }
}
