//! Local collection cache: the latest snapshot observed per query.
//!
//! Copies here are advisory. A write always replaces the whole snapshot for its key; entity
//! fields are never patched in place.

use std::collections::HashMap;

use crate::store::{Collection, QuerySpec, Snapshot};

#[derive(Debug, Default)]
pub struct CollectionCache {
    entries: HashMap<QuerySpec, Snapshot>,
}

impl CollectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &QuerySpec) -> Option<&Snapshot> {
        self.entries.get(key)
    }

    /// Replace the snapshot for `key`. Returns the one it displaced.
    pub fn set(&mut self, key: QuerySpec, snapshot: Snapshot) -> Option<Snapshot> {
        self.entries.insert(key, snapshot)
    }

    pub fn invalidate(&mut self, key: &QuerySpec) -> Option<Snapshot> {
        self.entries.remove(key)
    }

    /// Drop every snapshot of `collection`, returning the keys that were cached.
    pub fn invalidate_collection(&mut self, collection: Collection) -> Vec<QuerySpec> {
        let keys = self.keys_for(collection);
        for key in &keys {
            self.entries.remove(key);
        }
        keys
    }

    pub fn keys_for(&self, collection: Collection) -> Vec<QuerySpec> {
        self.entries
            .keys()
            .filter(|k| k.collection == collection)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
