// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trflow contributors

//! Injectable store
//!
//! Registry of values produced while a run progresses. Producers register
//! either a plain value or a live [`Shared`] handle they keep mutating; the
//! resolver never reads the registry directly, only the [`Snapshot`] taken by
//! [`InjectableStore::load_injectables`]. Writes (and in-place mutation of a
//! live handle) stay invisible until the next refresh.
//!
//! The store does no locking of its own. An engine that runs tasks
//! concurrently must serialize access to it.

mod snapshot;

pub use snapshot::Snapshot;

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::errors::{TrflowError, TrflowResult};

/// Live, shared handle a producer can keep updating after registration
pub type Shared<T> = Arc<RwLock<T>>;

/// Wrap a value in a [`Shared`] handle
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// Anything that can be serialized into the snapshot tree on demand
trait LiveValue: Send + Sync {
    fn to_tree(&self) -> Result<Value, String>;
}

impl<T: Serialize + Send + Sync> LiveValue for RwLock<T> {
    fn to_tree(&self) -> Result<Value, String> {
        let guard = self
            .read()
            .map_err(|_| "value lock poisoned by a panicking writer".to_string())?;
        serde_json::to_value(&*guard).map_err(|e| e.to_string())
    }
}

enum Entry {
    /// Aliased value, serialized at every refresh
    Live(Arc<dyn LiveValue>),
    /// Value copied at registration
    Fixed(Value),
}

/// Registry of named values plus the snapshot last taken of it
#[derive(Default)]
pub struct InjectableStore {
    entries: BTreeMap<String, Entry>,
    snapshot: Snapshot,
}

impl InjectableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a copy of `value` under `key`, replacing any previous entry
    pub fn set<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) -> TrflowResult<()> {
        let key = key.into();
        let tree = serde_json::to_value(value).map_err(|e| TrflowError::SnapshotFailed {
            key: key.clone(),
            message: e.to_string(),
        })?;
        debug!(key = %key, "registered injectable");
        self.entries.insert(key, Entry::Fixed(tree));
        Ok(())
    }

    /// Register a live handle under `key`; no copy is made
    pub fn set_shared<T>(&mut self, key: impl Into<String>, handle: &Shared<T>)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let key = key.into();
        debug!(key = %key, "registered live injectable");
        let live: Arc<dyn LiveValue> = handle.clone();
        self.entries.insert(key, Entry::Live(live));
    }

    /// Drop the entry under `key`
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Whether `key` is registered (regardless of snapshot state)
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recompute the snapshot from every registered entry
    pub fn load_injectables(&mut self) -> TrflowResult<&Snapshot> {
        self.snapshot = Snapshot::capture(self)?;
        debug!(entries = self.snapshot.len(), "refreshed injectable snapshot");
        Ok(&self.snapshot)
    }

    /// Snapshot as of the last [`load_injectables`](Self::load_injectables)
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Resolve a dotted path against the current snapshot
    pub fn get(&self, key: &str) -> TrflowResult<&Value> {
        self.snapshot.get(key)
    }

    /// Load a JSON object of fixed entries and take a snapshot of it
    pub fn from_file(path: &Path) -> TrflowResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TrflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse a JSON object of fixed entries and take a snapshot of it
    pub fn from_json(json: &str) -> TrflowResult<Self> {
        let entries = match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => map,
            other => {
                return Err(TrflowError::InvalidStoreFile {
                    found: kind_name(&other).to_string(),
                })
            }
        };

        let mut store = Self::new();
        for (key, value) in entries {
            store.entries.insert(key, Entry::Fixed(value));
        }
        store.load_injectables()?;
        Ok(store)
    }
}

impl Snapshot {
    /// Serialize every entry of `store` into a fresh snapshot
    pub fn capture(store: &InjectableStore) -> TrflowResult<Self> {
        let mut tree = Map::new();
        for (key, entry) in &store.entries {
            let value = match entry {
                Entry::Fixed(value) => value.clone(),
                Entry::Live(live) => live.to_tree().map_err(|message| TrflowError::SnapshotFailed {
                    key: key.clone(),
                    message,
                })?,
            };
            tree.insert(key.clone(), value);
        }
        Ok(Self::from_entries(tree))
    }
}

impl std::fmt::Debug for InjectableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectableStore")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .field("snapshot_entries", &self.snapshot.len())
            .finish()
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
