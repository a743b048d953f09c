//! The expiry loop and the pieces it is built from.
//!
//! `signal` holds the single reusable wait primitive, and `expiry` the scheduler that keeps
//! the two mirrored indices in step and fires triggers in time order.
use crate::codec::timestamp::Timestamp;

pub mod expiry;
pub mod signal;

/// Callback invoked once when a key's expiry time is reached.
///
/// Runs inside the scheduler loop; a slow trigger delays every later expiry.
pub trait Trigger<K>: Send + Sync {
    fn on_expire(&self, at: Timestamp, key: &K);
}

impl<K, F> Trigger<K> for F
where
    F: Fn(Timestamp, &K) + Send + Sync,
{
    fn on_expire(&self, at: Timestamp, key: &K) {
        self(at, key)
    }
}
