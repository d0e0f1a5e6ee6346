//! Concurrent cache.
//!
//! Thin wrapper around moka's sync cache. The engine uses it to hold the
//! handles of running executions.

use moka::sync::Cache;

/// Thread-safe cache without a capacity bound.
///
/// Nothing is ever evicted; entries leave only through [`remove`](Self::remove).
#[derive(Clone)]
pub struct MemCache<K, V> {
    entries: Cache<K, V>,
}

impl<K, V> MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().build(),
        }
    }

    pub fn set(
        &self,
        key: K,
        value: V,
    ) {
        self.entries.insert(key, value);
    }

    pub fn get(
        &self,
        key: &K,
    ) -> Option<V> {
        self.entries.get(key)
    }

    pub fn remove(
        &self,
        key: &K,
    ) -> Option<V> {
        self.entries.remove(key)
    }

    /// Exact number of entries at the time of the call.
    pub fn len(&self) -> usize {
        self.entries.iter().count()
    }

    /// Iterate a point-in-time view of the entries.
    pub fn iter(&self) -> moka::sync::Iter<'_, K, V> {
        self.entries.iter()
    }
}

impl<K, V> Default for MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
