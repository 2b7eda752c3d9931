//! # Shared Types Crate
//!
//! Identifiers, the message envelope and its codec, and the topic namer used
//! by every crate of the storage miner.
//!
//! ## Design Principles
//!
//! - **Closed payload set**: `Payload` is a sum type; the message kind is its
//!   discriminant, so a decoded envelope always carries a known payload shape.
//! - **One frozen schema**: the wire format is versioned by
//!   [`codec::PROTOCOL_VERSION`] and any other version is rejected.
//! - **Envelope authority**: payloads never carry the sender's identity; the
//!   transport reports it alongside the bytes.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod codec;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod topics;

pub use codec::{
    decode_envelope, encode_envelope, MAX_ENVELOPE_SIZE, MAX_SAMPLE_REQUEST_SIZE, PROTOCOL_VERSION,
};
pub use entities::*;
pub use envelope::*;
pub use errors::*;
pub use topics::{heartbeat_topic, inbox_topic, inspector_topic, ipfc_topic, TOPIC_VERSION};
