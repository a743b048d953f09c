//! In-memory ordered map, the default backing for tests and non-persistent caches.
use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{OrderedStore, Store};
use crate::{LapseError, LapseResult};

#[derive(Debug)]
pub struct MemoryStore<K, V> {
    entries: RwLock<BTreeMap<K, V>>,
}

impl<K: Ord, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl<K: Ord, V> MemoryStore<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<K, V> Store for MemoryStore<K, V>
where
    K: Ord + Send + Sync,
    V: Clone + PartialEq + Send + Sync,
{
    type Key = K;
    type Value = V;

    fn get(&self, key: &K) -> LapseResult<V> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or(LapseError::NotFound)
    }

    fn set(&self, key: K, value: V) -> LapseResult<()> {
        self.entries.write().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &K) -> LapseResult<()> {
        self.entries
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or(LapseError::NotFound)
    }

    fn delete_if_eq(&self, key: &K, expected: &V) -> LapseResult<bool> {
        let mut entries = self.entries.write();
        if entries.get(key) != Some(expected) {
            return Ok(false);
        }
        entries.remove(key);
        Ok(true)
    }

    fn contains(&self, key: &K) -> LapseResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn len(&self) -> LapseResult<usize> {
        Ok(self.entries.read().len())
    }
}

impl<K, V> OrderedStore for MemoryStore<K, V>
where
    K: Ord + Clone + Send + Sync,
    V: Clone + PartialEq + Send + Sync,
{
    // snapshot, the lock can't outlive this call
    fn iter_ascending(&self) -> LapseResult<Box<dyn Iterator<Item = LapseResult<K>> + '_>> {
        let keys: Vec<K> = self.entries.read().keys().cloned().collect();
        Ok(Box::new(keys.into_iter().map(Ok)))
    }

    fn first(&self) -> LapseResult<(K, V)> {
        self.entries
            .read()
            .first_key_value()
            .map(|(k, v)| (k.clone(), v.clone()))
            .ok_or(LapseError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entries_are_not_found() {
        let store: MemoryStore<String, u64> = MemoryStore::new();
        assert_eq!(store.get(&"nope".to_string()), Err(LapseError::NotFound));
        assert_eq!(store.delete(&"nope".to_string()), Err(LapseError::NotFound));
        assert_eq!(store.first(), Err(LapseError::NotFound));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_set_overwrites_and_first_is_minimum() {
        let store = MemoryStore::new();
        store.set(3u64, "c").unwrap();
        store.set(1u64, "a").unwrap();
        store.set(1u64, "a2").unwrap();
        store.set(2u64, "b").unwrap();
        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(store.first().unwrap(), (1, "a2"));
        let keys: Vec<u64> = store
            .iter_ascending()
            .unwrap()
            .collect::<LapseResult<_>>()
            .unwrap();
        assert_eq!(keys, vec![1, 2, 3]);
        store.delete(&1).unwrap();
        assert!(!store.contains(&1).unwrap());
        assert_eq!(store.first().unwrap(), (2, "b"));
    }

    #[test]
    fn test_delete_if_eq_only_removes_matching_value() {
        let store = MemoryStore::new();
        store.set("k", 5u64).unwrap();
        assert_eq!(store.delete_if_eq(&"k", &4), Ok(false));
        assert_eq!(store.get(&"k"), Ok(5));
        assert_eq!(store.delete_if_eq(&"k", &5), Ok(true));
        assert_eq!(store.delete_if_eq(&"k", &5), Ok(false));
        assert!(store.is_empty().unwrap());
    }
}
