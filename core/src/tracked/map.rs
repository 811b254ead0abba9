//! Ordered key-value map with a dirty flag.
//!
//! Every mutation marks the map dirty. Only the owning store clears the flag,
//! after it has consumed the current contents.

use std::borrow::Borrow;
use std::hash::Hash;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ConfigError;


/// Insertion-ordered map that records whether it changed since it was last
/// consumed by its owner.
#[derive(Debug, Clone)]
pub struct ChangeTrackedMap<K, V> {
    entries: IndexMap<K, V>,
    /// Set on every insert, update and delete; cleared by the owner.
    dirty: bool,
}

impl<K: Hash + Eq, V> ChangeTrackedMap<K, V> {
    /// Create an empty map.
    ///
    /// A fresh map starts dirty: nothing has consumed it yet.
    pub fn new() -> Self {
        ChangeTrackedMap {
            entries: IndexMap::new(),
            dirty: true,
        }
    }

    /// Wrap a plain bag of entries. Starts dirty, like [`ChangeTrackedMap::new`].
    pub fn from_bag(bag: IndexMap<K, V>) -> Self {
        ChangeTrackedMap {
            entries: bag,
            dirty: true,
        }
    }

    /// Look up a value by key.
    pub fn get<Q>(&self, key: &Q) -> Result<&V, ConfigError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToString + ?Sized,
    {
        self.entries
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
    }

    /// Insert or replace a value. Returns the previous value, if any.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        self.dirty = true;
        self.entries.insert(key, value)
    }

    /// Remove an entry, keeping the order of the remaining ones.
    ///
    /// Only marks the map dirty when something was actually removed.
    pub fn delete<Q>(&mut self, key: &Q) -> Result<V, ConfigError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToString + ?Sized,
    {
        match self.entries.shift_remove(key) {
            Some(value) => {
                self.dirty = true;
                Ok(value)
            }
            None => Err(ConfigError::NotFound(key.to_string())),
        }
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Entries in insertion order. Each call starts a new pass.
    pub fn iter(&self) -> indexmap::map::Iter<'_, K, V> {
        self.entries.iter()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, K, V> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read-only view of the underlying ordered map.
    pub fn as_map(&self) -> &IndexMap<K, V> {
        &self.entries
    }

    pub fn into_inner(self) -> IndexMap<K, V> {
        self.entries
    }

    /// Clear the dirty flag. Reserved for the owner that consumed the
    /// current contents.
    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// Equal when the entries match in order and both share the same dirty state.
impl<K: Hash + Eq, V: PartialEq> PartialEq for ChangeTrackedMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.dirty == other.dirty && self.entries.iter().eq(other.entries.iter())
    }
}

impl<K: Hash + Eq, V> Default for ChangeTrackedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V> From<IndexMap<K, V>> for ChangeTrackedMap<K, V> {
    fn from(bag: IndexMap<K, V>) -> Self {
        Self::from_bag(bag)
    }
}

impl From<serde_json::Map<String, Value>> for ChangeTrackedMap<String, Value> {
    fn from(bag: serde_json::Map<String, Value>) -> Self {
        Self::from_bag(bag.into_iter().collect())
    }
}

impl<K: Hash + Eq, V> FromIterator<(K, V)> for ChangeTrackedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_bag(iter.into_iter().collect())
    }
}

impl<'a, K, V> IntoIterator for &'a ChangeTrackedMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = indexmap::map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
