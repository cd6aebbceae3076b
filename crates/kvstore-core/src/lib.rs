//! KV Store Core — named key-value stores with JSON persistence
//!
//! Each store keeps its map in RAM and mirrors it to one JSON file.
//!
//! # Architecture
//!
//! - **Read path**: served from the in-memory map, never touches disk
//! - **Write path**: map update, then a snapshot is queued for the store's writer
//! - **Save queue**: one background thread per store applies snapshots in order,
//!   replacing the file atomically each time
//!
//! Stores are independent: each has its own lock, queue and thread.
//! A `Registry` owns the stores and resolves names for callers.

pub mod config;
pub mod error;
pub mod platform_durability;
pub mod registry;
pub mod save_queue;
pub mod snapshot_file;
pub mod store;

// Re-export key types for convenience
pub use config::StoreConfig;
pub use error::{KvError, KvResult};
pub use registry::Registry;
pub use save_queue::{SaveQueue, SaveStats};
pub use snapshot_file::Snapshot;
pub use store::{validate_store_name, Store};

/// JSON value type stored under each key
pub use serde_json::Value;
