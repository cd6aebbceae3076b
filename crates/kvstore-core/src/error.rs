//! Error types for KV store operations
//!
//! Nothing in this crate is fatal. Errors are returned so callers can log
//! them with context and carry on; the store itself stays usable.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// KV store error types with enough context to log usefully
#[derive(Debug, Clone)]
pub enum KvError {
    /// I/O operation failed
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// Backing file exists but is not a flat JSON object
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Store name cannot be used to derive a file name
    InvalidStoreName {
        name: String,
        reason: String,
    },

    /// Configuration rejected by `StoreConfig::validate`
    InvalidConfig(String),

    /// Operation addressed a store that was never registered
    StoreNotFound {
        name: String,
        /// Registered store names, sorted
        available: Vec<String>,
    },

    /// Delete addressed a key that is not in the store
    KeyNotFound {
        store: String,
        key: String,
    },

    /// Service call data did not match the expected schema
    InvalidCall(String),

    /// The store's writer thread is gone; saves can no longer be applied
    QueueClosed {
        store: String,
    },
}

impl fmt::Display for KvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KvError::Io { path, kind, message } => {
                if let Some(path) = path {
                    write!(f, "I/O error in {}: {} ({})", path.display(), message, kind)
                } else {
                    write!(f, "I/O error: {} ({})", message, kind)
                }
            }

            KvError::Parse { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }

            KvError::InvalidStoreName { name, reason } => {
                write!(f, "Invalid store name {:?}: {}", name, reason)
            }

            KvError::InvalidConfig(reason) => write!(f, "Invalid configuration: {}", reason),

            KvError::StoreNotFound { name, available } => {
                write!(f, "Store {} not found. Available stores: {:?}", name, available)
            }

            KvError::KeyNotFound { store, key } => {
                write!(f, "Key {} not found in {}", key, store)
            }

            KvError::InvalidCall(reason) => write!(f, "Invalid service call: {}", reason),

            KvError::QueueClosed { store } => {
                write!(f, "Save queue for {} is closed", store)
            }
        }
    }
}

impl Error for KvError {}

/// Convert std::io::Error to KvError::Io
impl From<std::io::Error> for KvError {
    fn from(err: std::io::Error) -> Self {
        KvError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for KV store operations
pub type KvResult<T> = Result<T, KvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_lists_available() {
        let err = KvError::StoreNotFound {
            name: "garage".into(),
            available: vec!["default".into(), "pantry".into()],
        };

        let display = format!("{}", err);
        assert!(display.contains("Store garage not found"));
        assert!(display.contains("\"pantry\""));
    }

    #[test]
    fn test_io_error_display_with_path() {
        let err = KvError::Io {
            path: Some(PathBuf::from("/tmp/.storage/kv_store_a.json")),
            kind: std::io::ErrorKind::PermissionDenied,
            message: "Failed to write snapshot".into(),
        };
        let display = err.to_string();
        assert!(display.contains("kv_store_a.json"));
        assert!(display.contains("Failed to write snapshot"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let kv_err: KvError = io_err.into();

        match kv_err {
            KvError::Io { kind, path, .. } => {
                assert_eq!(kind, std::io::ErrorKind::NotFound);
                assert!(path.is_none());
            }
            _ => panic!("Expected Io error"),
        }
    }
}
