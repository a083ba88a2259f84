//! In-memory snapshot of the last-known version of every watched resource.
//!
//! Storage is sharded by kind: each kind owns an independent name map, so observers
//! of different kinds never contend on the same lock.

use std::collections::HashMap;

use dashmap::DashMap;

use crate::domain::resource::ResourceRecord;

#[derive(Debug, Default)]
pub struct SnapshotStore {
    kinds: DashMap<String, HashMap<String, ResourceRecord>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: &str, name: &str) -> Option<ResourceRecord> {
        self.kinds.get(kind)?.get(name).cloned()
    }

    /// Unconditionally overwrites the record, returning the previous one.
    pub fn put(&self, kind: &str, name: &str, record: ResourceRecord) -> Option<ResourceRecord> {
        self.kinds
            .entry(kind.to_string())
            .or_default()
            .insert(name.to_string(), record)
    }

    /// Removes the record, returning it if it was present.
    pub fn delete(&self, kind: &str, name: &str) -> Option<ResourceRecord> {
        self.kinds.get_mut(kind)?.remove(name)
    }

    /// Number of records held for `kind`.
    pub fn len(&self, kind: &str) -> usize {
        self.kinds.get(kind).map_or(0, |shard| shard.len())
    }

    pub fn is_empty(&self, kind: &str) -> bool {
        self.len(kind) == 0
    }

    /// Names currently held for `kind`.
    pub fn names(&self, kind: &str) -> Vec<String> {
        self.kinds
            .get(kind)
            .map(|shard| shard.keys().cloned().collect())
            .unwrap_or_default()
    }
}
