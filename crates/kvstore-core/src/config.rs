//! Configuration for KV stores
//!
//! Decides where store files live and how hard the writer tries to make
//! each save durable. Two presets cover the common cases.

use std::path::{Path, PathBuf};

/// Directory (under the config root) holding every store file
pub const DEFAULT_STORAGE_DIR: &str = ".storage";

/// Integration domain; store files are named after it
pub const DOMAIN: &str = "kv_store";

/// File name prefix, `<DOMAIN>_`; the full name is `<prefix><store_name>.json`
pub const DEFAULT_FILE_PREFIX: &str = "kv_store_";

/// KV store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory of the host configuration
    pub config_root: PathBuf,
    /// Storage directory name, relative to `config_root`
    pub storage_dir: String,
    /// Prefix for each store's file name
    pub file_prefix: String,
    /// fsync the snapshot and its directory on every save
    pub durable_writes: bool,
}

impl StoreConfig {
    /// Durable preset: every save is synced to stable storage before the
    /// writer moves on.
    pub fn durable<P: Into<PathBuf>>(config_root: P) -> Self {
        Self {
            config_root: config_root.into(),
            storage_dir: DEFAULT_STORAGE_DIR.to_string(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            durable_writes: true,
        }
    }

    /// Relaxed preset: atomic replace only, no fsync. Faster, and still never
    /// leaves a half-written file behind, but a power loss may lose the
    /// latest saves.
    pub fn relaxed<P: Into<PathBuf>>(config_root: P) -> Self {
        Self {
            durable_writes: false,
            ..Self::durable(config_root)
        }
    }

    pub fn with_storage_dir(mut self, storage_dir: impl Into<String>) -> Self {
        self.storage_dir = storage_dir.into();
        self
    }

    pub fn with_file_prefix(mut self, file_prefix: impl Into<String>) -> Self {
        self.file_prefix = file_prefix.into();
        self
    }

    pub fn with_durable_writes(mut self, durable_writes: bool) -> Self {
        self.durable_writes = durable_writes;
        self
    }

    /// Directory holding all store files
    pub fn storage_path(&self) -> PathBuf {
        self.config_root.join(&self.storage_dir)
    }

    /// Backing file for the named store
    pub fn store_path(&self, store_name: &str) -> PathBuf {
        self.storage_path()
            .join(format!("{}{}.json", self.file_prefix, store_name))
    }

    pub fn config_root(&self) -> &Path {
        &self.config_root
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.config_root.as_os_str().is_empty() {
            return Err("config_root must not be empty".into());
        }
        if self.storage_dir.is_empty() {
            return Err("storage_dir must not be empty".into());
        }
        if Path::new(&self.storage_dir).is_absolute() {
            return Err("storage_dir must be relative to config_root".into());
        }
        if self.file_prefix.contains(['/', '\\']) {
            return Err("file_prefix must not contain path separators".into());
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::durable(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_valid() {
        assert!(StoreConfig::durable("/config").validate().is_ok());
        assert!(StoreConfig::relaxed("/config").validate().is_ok());
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_store_path_layout() {
        let config = StoreConfig::durable("/config");
        assert_eq!(
            config.store_path("pantry"),
            PathBuf::from("/config/.storage/kv_store_pantry.json")
        );
    }

    #[test]
    fn test_file_prefix_follows_domain() {
        assert_eq!(DEFAULT_FILE_PREFIX, format!("{}_", DOMAIN));
    }

    #[test]
    fn test_builder_overrides() {
        let config = StoreConfig::relaxed("/srv")
            .with_storage_dir("state")
            .with_file_prefix("kv_")
            .with_durable_writes(true);
        assert!(config.durable_writes);
        assert_eq!(config.store_path("a"), PathBuf::from("/srv/state/kv_a.json"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(StoreConfig::durable("").validate().is_err());
        assert!(StoreConfig::durable("/c").with_storage_dir("").validate().is_err());
        assert!(StoreConfig::durable("/c").with_storage_dir("/abs").validate().is_err());
        assert!(StoreConfig::durable("/c").with_file_prefix("a/b").validate().is_err());
    }
}
