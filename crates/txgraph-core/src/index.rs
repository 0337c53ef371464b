//! # Attribute Index
//!
//! Inverted index from `(Attribute, value)` to the nodes carrying that value.
//!
//! Maintained by the `Graph` on every upsert: the old and new attribute
//! sets of a node are diffed, stale entries removed and new ones added.
//! Empty values are never indexed, so they never produce a match.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Attribute, NodeKey};

/// `(attribute, value) → node keys`, deterministic ordering throughout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeIndex {
    buckets: BTreeMap<(Attribute, String), BTreeSet<NodeKey>>,
}

impl AttributeIndex {
    /// Creates a new empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `key` under `(attr, value)`. Empty values are ignored.
    pub fn insert(&mut self, key: &NodeKey, attr: Attribute, value: &str) {
        if value.is_empty() {
            return;
        }
        self.buckets
            .entry((attr, value.to_string()))
            .or_default()
            .insert(key.clone());
    }

    /// Remove `key` from `(attr, value)`, dropping the bucket when it empties.
    pub fn remove(&mut self, key: &NodeKey, attr: Attribute, value: &str) {
        let bucket_key = (attr, value.to_string());
        if let Some(bucket) = self.buckets.get_mut(&bucket_key) {
            bucket.remove(key);
            if bucket.is_empty() {
                self.buckets.remove(&bucket_key);
            }
        }
    }

    /// Replace the indexed values of `key`: entries only in `old` are
    /// removed, entries only in `new` are added.
    pub fn update(&mut self, key: &NodeKey, old: &[(Attribute, &str)], new: &[(Attribute, &str)]) {
        for &(attr, value) in old {
            if !new.contains(&(attr, value)) {
                self.remove(key, attr, value);
            }
        }
        for &(attr, value) in new {
            if !old.contains(&(attr, value)) {
                self.insert(key, attr, value);
            }
        }
    }

    /// Nodes carrying `value` for `attr`.
    #[must_use]
    pub fn get(&self, attr: Attribute, value: &str) -> Option<&BTreeSet<NodeKey>> {
        self.buckets.get(&(attr, value.to_string()))
    }

    /// Union of the buckets for `values`, excluding `exclude`.
    #[must_use]
    pub fn candidates(&self, values: &[(Attribute, &str)], exclude: &NodeKey) -> BTreeSet<NodeKey> {
        values
            .iter()
            .filter_map(|&(attr, value)| self.get(attr, value))
            .flatten()
            .filter(|key| *key != exclude)
            .cloned()
            .collect()
    }

    /// Number of distinct `(attribute, value)` buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
