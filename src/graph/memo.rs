//! Memo table for recursive computations
//!
//! Every key is in one of three states. Re-entering a key whose value is
//! still being computed is reported as [`Lookup::Cyclic`]; each caller
//! decides whether that is an error or an empty contribution.

use std::collections::HashMap;
use std::hash::Hash;

/// State of one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry<V> {
    Uncomputed,
    InProgress,
    Done(V),
}

/// Answer to [`MemoTable::begin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Already computed
    Cached(V),
    /// The key is being computed further up the stack
    Cyclic,
    /// The key is now `InProgress`; compute it and call `finish`
    Compute,
}

#[derive(Debug, Clone)]
pub struct MemoTable<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K, V> Default for MemoTable<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> MemoTable<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, key: &K) -> CacheEntry<&V> {
        match self.entries.get(key) {
            None | Some(CacheEntry::Uncomputed) => CacheEntry::Uncomputed,
            Some(CacheEntry::InProgress) => CacheEntry::InProgress,
            Some(CacheEntry::Done(value)) => CacheEntry::Done(value),
        }
    }

    /// Start computing `key` unless it is cached or already in progress
    pub fn begin(&mut self, key: &K) -> Lookup<V> {
        match self.entries.get(key) {
            Some(CacheEntry::Done(value)) => Lookup::Cached(value.clone()),
            Some(CacheEntry::InProgress) => Lookup::Cyclic,
            None | Some(CacheEntry::Uncomputed) => {
                self.entries.insert(key.clone(), CacheEntry::InProgress);
                Lookup::Compute
            }
        }
    }

    pub fn finish(&mut self, key: K, value: V) {
        self.entries.insert(key, CacheEntry::Done(value));
    }

    /// Drop an in-progress key after a failed computation
    pub fn abandon(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// Completed entries
    pub fn completed(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().filter_map(|(k, entry)| match entry {
            CacheEntry::Done(value) => Some((k, value)),
            _ => None,
        })
    }
}
