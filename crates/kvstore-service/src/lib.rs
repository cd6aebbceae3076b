//! KV Store service layer
//!
//! The operation surface a host application calls into: `set` and `delete`
//! against a named store, plus the store declaration read at startup and
//! a plain summary of each store for whatever presents it.
//!
//! # Architecture
//!
//! - Call data arrives already rendered to plain values; this crate parses
//!   it, strips the entity prefix from store references and flattens nested
//!   values
//! - `KvService` owns a `Registry` and forwards each call to one `Store`
//! - Failures (unknown store, unknown key, malformed call) are logged and
//!   dropped; nothing here returns an error to the host

pub mod call;
pub mod declaration;
pub mod logging;
pub mod service;
pub mod summary;

pub use call::{normalize_store_name, render_value, DeleteCall, ServiceCall, SetCall};
pub use declaration::StoreDeclaration;
pub use service::{CallOutcome, KvService};
pub use summary::StoreSummary;

pub use kvstore_core::config::DOMAIN;

/// Store used when the configuration names none
pub const DEFAULT_STORE_NAME: &str = "default";

pub const SERVICE_SET: &str = "set";
pub const SERVICE_DELETE: &str = "delete";

pub const ATTR_KEY: &str = "key";
pub const ATTR_VALUE: &str = "value";
pub const ATTR_STORE_NAME: &str = "store_name";

/// Prefix of store references given as entity ids, e.g. `sensor.pantry`
pub const ENTITY_PREFIX: &str = "sensor.";
