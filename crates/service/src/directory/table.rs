use std::hash::Hash;

use ahash::{HashMap, HashMapExt};

/// A keyed map, wrapped so the rest of the crate never has to spell
/// out `ahash::HashMap` directly (spec §9's "shared container type"
/// design note). Grounded on the teacher's own `session::Table<K, V>`
/// wrapper, minus the pre-sized port-range capacity hint that made
/// sense for a TURN allocator and not for a user/peer/channel table.
pub struct Table<K, V>(HashMap<K, V>);

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash,
{
    pub fn get(&self, key: &K) -> Option<&V> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.0.get_mut(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.0.contains_key(key)
    }

    /// Insert, returning the previous value if this key already had one.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.0.insert(key, value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.0.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.0.values_mut()
    }

    /// A consistent array copy of the keys, so a caller can mutate the
    /// table while iterating the snapshot (spec §4.2).
    pub fn key_snapshot(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.0.keys().cloned().collect()
    }

    /// A consistent array copy of the values, same rationale.
    pub fn value_snapshot(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.0.values().cloned().collect()
    }
}
