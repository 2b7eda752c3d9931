//! # Error Types
//!
//! Error types shared across crates: identifier validation, envelope codec,
//! the content store capability and the pub/sub capability.

use thiserror::Error;

use crate::entities::ContentId;

/// Errors from identifier parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("Content id is empty")]
    Empty,

    #[error("Content id is {len} characters long, maximum is {max}")]
    TooLong { len: usize, max: usize },

    #[error("Content id contains invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("Unknown node role: {0}")]
    UnknownRole(String),
}

/// Errors from encoding or decoding an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The envelope could not be serialized.
    #[error("Failed to encode envelope: {0}")]
    Encode(String),

    /// The bytes are not a well-formed envelope of a known kind.
    #[error("Failed to decode envelope: {0}")]
    Decode(String),

    /// The envelope was produced for a different protocol version.
    #[error("Unsupported protocol version: received {received}, supported {supported}")]
    UnsupportedVersion { received: u16, supported: u16 },

    /// The envelope is over the size limit for its kind.
    #[error("{kind} envelope of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        kind: &'static str,
        size: u64,
        limit: u64,
    },
}

/// Errors reported by the external content store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The object does not exist in the store or any of its sources.
    #[error("Content not found: {0}")]
    NotFound(ContentId),

    /// The object's source could not be reached.
    #[error("Content source unreachable: {0}")]
    Unreachable(String),

    /// The object is not held locally.
    #[error("Content not retained: {0}")]
    NotRetained(ContentId),

    /// Local disk is too full to accept the object.
    #[error("Insufficient disk space: only {available_percent}% available, need {required_percent}%")]
    InsufficientSpace {
        available_percent: u8,
        required_percent: u8,
    },

    /// Local I/O failure.
    #[error("Storage I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors reported by the pub/sub transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("Failed to join topic {topic}: {reason}")]
    Join { topic: String, reason: String },

    #[error("Failed to subscribe to topic {topic}: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("Failed to publish to topic {topic}: {reason}")]
    Publish { topic: String, reason: String },

    /// The bus has shut down.
    #[error("Bus closed")]
    Closed,
}
