//! Deferred key expiry driven by a single interruptible wait loop.
//!
//! Expiry times live in two caller-supplied stores (time -> key and key -> time) rather than
//! an in-memory timer heap, so a persistent store keeps the schedule and the data it guards
//! in the same place. See [`scheduling::expiry::Expirer`] for the loop itself.
use std::fmt::Display;

use thiserror::Error;

use crate::codec::DecodeError;

pub mod codec;
pub mod config;
pub mod scheduling;
pub mod store;

pub use codec::{timestamp::Timestamp, ByteCodec};
pub use config::SchedulerConfig;
pub use scheduling::{expiry::Expirer, signal::WakeSignal, Trigger};
pub use store::{
    dir::DirStore, memory::MemoryStore, sled_store::SledStore, Evict, OrderedStore, Store, TimeKey,
};

/// Wrapper type for `std::io::Error`
#[derive(Debug, Error)]
pub struct IoError(std::io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl Eq for IoError {}
impl Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wrapper type for `sled::Error`
#[derive(Debug, Error)]
pub struct SledError(sled::Error);

impl PartialEq for SledError {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_string() == other.0.to_string()
    }
}

impl Eq for SledError {}
impl Display for SledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the scheduler and its stores
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LapseError {
    #[error("Entry not found")]
    NotFound,
    #[error("Failed to decode stored bytes: {0}")]
    Decode(#[from] DecodeError),
    #[error("I/O error in backing store {:?}", err)]
    Io {
        #[from]
        err: IoError,
    },
    #[error("sled error in backing store: {err}")]
    Sled {
        #[from]
        err: SledError,
    },
    #[error("Expiry time is outside the representable range")]
    TimeOverflow,
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}

impl From<std::io::Error> for LapseError {
    fn from(err: std::io::Error) -> Self {
        LapseError::Io { err: IoError(err) }
    }
}

impl From<sled::Error> for LapseError {
    fn from(err: sled::Error) -> Self {
        LapseError::Sled {
            err: SledError(err),
        }
    }
}

pub type LapseResult<T> = Result<T, LapseError>;

/// Treats `NotFound` as success, for removals where the entry may already be gone.
pub(crate) fn ignore_missing(result: LapseResult<()>) -> LapseResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(LapseError::NotFound) => Ok(false),
        Err(err) => Err(err),
    }
}
