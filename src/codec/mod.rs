//! Byte encodings for stores whose only ordering capability is lexicographic byte order.
//!
//! `timestamp` holds the fixed-width time encoding; the `ByteCodec` impls here cover the
//! common key and value types so they can be used with the byte-backed stores.
use thiserror::Error;

pub mod timestamp;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("Nanosecond field out of range: {0}")]
    NanosOutOfRange(u32),
    #[error("Stored bytes are not valid UTF-8")]
    InvalidUtf8,
    #[error("Invalid hex entry name: {0}")]
    InvalidHex(String),
}

/// Conversion to and from bytes. For keys of ordered stores, the encoding must preserve `Ord`.
pub trait ByteCodec: Sized {
    fn encode_bytes(&self) -> Vec<u8>;
    fn decode_bytes(buf: &[u8]) -> Result<Self, DecodeError>;
}

impl ByteCodec for Vec<u8> {
    fn encode_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn decode_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        Ok(buf.to_vec())
    }
}

impl ByteCodec for String {
    fn encode_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        String::from_utf8(buf.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }
}

impl ByteCodec for u64 {
    fn encode_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn decode_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        let bytes: [u8; 8] = buf.try_into().map_err(|_| DecodeError::InvalidLength {
            expected: 8,
            got: buf.len(),
        })?;
        Ok(u64::from_be_bytes(bytes))
    }
}
