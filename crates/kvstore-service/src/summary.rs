//! Plain view of a store for presentation.
//!
//! Whatever displays stores polls `KvService::summaries` and compares
//! `revision` to decide whether anything changed since the last poll.

use std::collections::BTreeMap;

use kvstore_core::{Store, Value};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSummary {
    pub name: String,
    /// Number of keys
    pub count: usize,
    /// `"<count> items"`
    pub state: String,
    /// Full key-value map
    pub attributes: BTreeMap<String, Value>,
    pub revision: u64,
}

impl StoreSummary {
    pub fn of(store: &Store) -> Self {
        // One snapshot so count and attributes agree
        let attributes = store.snapshot();
        let count = attributes.len();
        Self {
            name: store.name().to_string(),
            count,
            state: format!("{} items", count),
            attributes,
            revision: store.revision(),
        }
    }
}
