//! Capability contract for the stores backing the expiry indices and the data table.
//!
//! The scheduler only ever talks to these traits. Three adapters ship with the crate: an
//! in-memory ordered map, a `sled` tree and a plain directory with one file per entry.
use crate::{
    codec::{timestamp::Timestamp, ByteCodec, DecodeError},
    LapseResult,
};

pub mod dir;
pub mod memory;
pub mod sled_store;

/// A keyed table. Missing entries are reported as `LapseError::NotFound`.
///
/// Implementations provide their own synchronization; every method takes `&self`.
pub trait Store: Send + Sync {
    type Key;
    type Value;

    fn get(&self, key: &Self::Key) -> LapseResult<Self::Value>;
    /// Insert or overwrite.
    fn set(&self, key: Self::Key, value: Self::Value) -> LapseResult<()>;
    /// Remove, failing with `NotFound` if absent.
    fn delete(&self, key: &Self::Key) -> LapseResult<()>;
    /// Removes `key` only while it still maps to `expected`, as one step with respect to other
    /// writers of this store. Returns whether it was removed; an absent key is `Ok(false)`.
    fn delete_if_eq(&self, key: &Self::Key, expected: &Self::Value) -> LapseResult<bool>;
    fn contains(&self, key: &Self::Key) -> LapseResult<bool>;
    fn len(&self) -> LapseResult<usize>;

    fn is_empty(&self) -> LapseResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// A `Store` that can walk its keys in ascending order.
pub trait OrderedStore: Store {
    fn iter_ascending(&self) -> LapseResult<Box<dyn Iterator<Item = LapseResult<Self::Key>> + '_>>;

    /// Smallest entry, or `NotFound` when empty. Only the first key of the iteration is read.
    fn first(&self) -> LapseResult<(Self::Key, Self::Value)> {
        let key = match self.iter_ascending()?.next() {
            Some(key) => key?,
            None => return Err(crate::LapseError::NotFound),
        };
        let value = self.get(&key)?;
        Ok((key, value))
    }
}

/// Object-safe removal from a data table, used for the optional data store.
pub trait Evict<K>: Send + Sync {
    /// Removes `key`, returning whether it was present.
    fn evict(&self, key: &K) -> LapseResult<bool>;
}

impl<K, S: Store<Key = K>> Evict<K> for S {
    fn evict(&self, key: &K) -> LapseResult<bool> {
        crate::ignore_missing(self.delete(key))
    }
}

/// Key of the time index: the expiry time, made unique by the key that expires at it.
///
/// Ordered by time first, so the smallest `TimeKey` is always the earliest expiry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeKey<K> {
    pub at: Timestamp,
    pub key: K,
}

impl<K> TimeKey<K> {
    pub fn new(at: Timestamp, key: K) -> Self {
        Self { at, key }
    }
}

impl<K: ByteCodec> ByteCodec for TimeKey<K> {
    fn encode_bytes(&self) -> Vec<u8> {
        let key = self.key.encode_bytes();
        let mut out = Vec::with_capacity(Timestamp::ENCODED_LEN + key.len());
        out.extend_from_slice(&self.at.encode());
        out.extend_from_slice(&key);
        out
    }

    fn decode_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < Timestamp::ENCODED_LEN {
            return Err(DecodeError::InvalidLength {
                expected: Timestamp::ENCODED_LEN,
                got: buf.len(),
            });
        }
        let (at, key) = buf.split_at(Timestamp::ENCODED_LEN);
        Ok(Self {
            at: Timestamp::decode(at)?,
            key: K::decode_bytes(key)?,
        })
    }
}
