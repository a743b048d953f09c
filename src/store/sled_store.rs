//! Byte-ordered persistent store over a `sled` tree.
//!
//! Keys and values go through [`ByteCodec`]; sled orders keys lexicographically by their
//! encoded bytes, which is why the time index relies on the order-preserving timestamp
//! encoding.
use std::marker::PhantomData;

use sled::{Db, Tree};

use super::{OrderedStore, Store};
use crate::{codec::ByteCodec, LapseError, LapseResult};

#[derive(Debug)]
pub struct SledStore<K, V> {
    tree: Tree,
    _phantom: PhantomData<fn() -> (K, V)>,
}

impl<K, V> SledStore<K, V> {
    /// Opens (or creates) the named tree in `db`.
    pub fn open(db: &Db, name: &str) -> LapseResult<Self> {
        Ok(Self::new(db.open_tree(name)?))
    }

    pub fn new(tree: Tree) -> Self {
        Self {
            tree,
            _phantom: PhantomData,
        }
    }

    pub fn flush(&self) -> LapseResult<()> {
        self.tree.flush()?;
        Ok(())
    }
}

impl<K: ByteCodec, V: ByteCodec> Store for SledStore<K, V> {
    type Key = K;
    type Value = V;

    fn get(&self, key: &K) -> LapseResult<V> {
        let raw = self.tree.get(key.encode_bytes())?;
        let raw = raw.ok_or(LapseError::NotFound)?;
        Ok(V::decode_bytes(&raw)?)
    }

    fn set(&self, key: K, value: V) -> LapseResult<()> {
        self.tree.insert(key.encode_bytes(), value.encode_bytes())?;
        self.flush()
    }

    fn delete(&self, key: &K) -> LapseResult<()> {
        let removed = self.tree.remove(key.encode_bytes())?;
        self.flush()?;
        removed.map(|_| ()).ok_or(LapseError::NotFound)
    }

    fn delete_if_eq(&self, key: &K, expected: &V) -> LapseResult<bool> {
        let swapped = self.tree.compare_and_swap(
            key.encode_bytes(),
            Some(expected.encode_bytes()),
            None::<Vec<u8>>,
        )?;
        self.flush()?;
        Ok(swapped.is_ok())
    }

    fn contains(&self, key: &K) -> LapseResult<bool> {
        Ok(self.tree.contains_key(key.encode_bytes())?)
    }

    fn len(&self) -> LapseResult<usize> {
        Ok(self.tree.len())
    }

    fn is_empty(&self) -> LapseResult<bool> {
        Ok(self.tree.is_empty())
    }
}

impl<K: ByteCodec, V: ByteCodec> OrderedStore for SledStore<K, V> {
    fn iter_ascending(&self) -> LapseResult<Box<dyn Iterator<Item = LapseResult<K>> + '_>> {
        Ok(Box::new(self.tree.iter().keys().map(|raw| -> LapseResult<K> {
            let raw = raw?;
            Ok(K::decode_bytes(&raw)?)
        })))
    }

    fn first(&self) -> LapseResult<(K, V)> {
        let (k, v) = self.tree.first()?.ok_or(LapseError::NotFound)?;
        Ok((K::decode_bytes(&k)?, V::decode_bytes(&v)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::DecodeError, store::TimeKey, Timestamp};

    fn temp_db() -> Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    #[test]
    fn test_time_index_first_is_earliest() {
        let db = temp_db();
        let index: SledStore<TimeKey<String>, String> = SledStore::open(&db, "time").unwrap();
        for (secs, key) in [(30, "c"), (-5, "a"), (10, "b")] {
            let at = Timestamp::new(secs, 0).unwrap();
            index
                .set(TimeKey::new(at, key.to_string()), key.to_string())
                .unwrap();
        }
        let (first, key) = index.first().unwrap();
        assert_eq!(first.at, Timestamp::new(-5, 0).unwrap());
        assert_eq!(key, "a");
        let order: Vec<String> = index
            .iter_ascending()
            .unwrap()
            .map(|k| k.unwrap().key)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_delete_if_eq_compares_encoded_value() {
        let db = temp_db();
        let store: SledStore<String, Timestamp> = SledStore::open(&db, "keys").unwrap();
        let key = "k".to_string();
        let old = Timestamp::new(10, 0).unwrap();
        let new = Timestamp::new(20, 0).unwrap();
        store.set(key.clone(), new).unwrap();

        assert_eq!(store.delete_if_eq(&key, &old), Ok(false));
        assert_eq!(store.get(&key), Ok(new));
        assert_eq!(store.delete_if_eq(&key, &new), Ok(true));
        assert_eq!(store.delete_if_eq(&key, &new), Ok(false));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_missing_and_corrupt_entries() {
        let db = temp_db();
        let store: SledStore<String, Timestamp> = SledStore::open(&db, "keys").unwrap();
        assert_eq!(store.get(&"x".to_string()), Err(LapseError::NotFound));
        assert_eq!(store.delete(&"x".to_string()), Err(LapseError::NotFound));

        db.open_tree("keys").unwrap().insert("x", vec![1u8, 2, 3]).unwrap();
        assert_eq!(
            store.get(&"x".to_string()),
            Err(LapseError::Decode(DecodeError::InvalidLength {
                expected: 12,
                got: 3
            }))
        );
    }
}
