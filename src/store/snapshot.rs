// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Point-in-time view of the injectable store

use serde_json::{Map, Value};

use crate::errors::{TrflowError, TrflowResult};
use crate::resolver::path;

/// Queryable tree of every store entry as of the last refresh
///
/// The root is a mapping from store key to that entry's serialized value.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    tree: Value,
}

impl Snapshot {
    /// A snapshot with no entries
    pub fn empty() -> Self {
        Self {
            tree: Value::Object(Map::new()),
        }
    }

    pub(crate) fn from_entries(entries: Map<String, Value>) -> Self {
        Self {
            tree: Value::Object(entries),
        }
    }

    /// Resolve a dotted store path
    pub fn get(&self, key: &str) -> TrflowResult<&Value> {
        path::lookup(&self.tree, key).map_err(|miss| TrflowError::StoreKeyNotFound {
            key: key.to_string(),
            segment: miss.segment,
        })
    }

    /// Whether a dotted store path resolves
    pub fn contains(&self, key: &str) -> bool {
        path::lookup(&self.tree, key).is_ok()
    }

    /// Number of top-level entries
    pub fn len(&self) -> usize {
        self.tree.as_object().map_or(0, Map::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole tree
    pub fn as_value(&self) -> &Value {
        &self.tree
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_missing_key_names_segment() {
        let mut entries = Map::new();
        entries.insert("crosTest".into(), json!({"address": "localhost", "port": 8010}));
        let snapshot = Snapshot::from_entries(entries);

        assert_eq!(snapshot.get("crosTest.port").unwrap(), &json!(8010));
        match snapshot.get("crosTest.host") {
            Err(TrflowError::StoreKeyNotFound { key, segment }) => {
                assert_eq!(key, "crosTest.host");
                assert_eq!(segment, "host");
            }
            other => panic!("Expected StoreKeyNotFound, got {:?}", other),
        }
        assert!(!snapshot.contains("rdbPublish"));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::empty();
        assert!(snapshot.is_empty());
        assert!(snapshot.get("anything").is_err());
    }
}
