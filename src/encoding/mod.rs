//! Key and value serialization for persisted segments.
//!
//! Keys are written with an order-preserving encoding so a segment's entry
//! stream can be checked for ordering at the byte level as well as after
//! decoding. Values don't need to preserve ordering and go through bincode.

pub mod bincode;
pub mod keycode;

use crate::error::Result;

/// An index key as stored in a segment.
///
/// For keys `a < b`, `a.encode() < b.encode()` must hold bytewise.
pub trait Key {
    fn encode(&self) -> Vec<u8>;

    /// Fails on bytes written for a different key type.
    fn decode(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// A stored value: a full line or a byte offset.
pub trait Value {
    fn encode(&self) -> Result<Vec<u8>>;

    fn decode(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("Invalid encoding format: {0}")]
    InvalidFormat(String),
    #[error("Truncated data")]
    TruncatedData,
    #[error("Invalid UTF-8 sequence")]
    InvalidUtf8,
}

impl From<EncodingError> for crate::Error {
    fn from(err: EncodingError) -> Self {
        crate::Error::Encoding(err.to_string())
    }
}
