//! # Envelope Codec
//!
//! Binary encoding of [`Envelope`] for use as the transport's opaque payload.
//!
//! ## Wire Format (version 1)
//!
//! `bincode` with varint integers, little endian, a size limit and trailing
//! bytes rejected. Field order is `version`, `nonce`, `payload`; the payload's
//! enum discriminant selects the concrete payload shape, so an unknown kind
//! fails to decode instead of being guessed.
//!
//! ## Size Limits
//!
//! Every envelope is bounded by [`MAX_ENVELOPE_SIZE`]. Sample requests are
//! further bounded by [`MAX_SAMPLE_REQUEST_SIZE`] so that their response,
//! which echoes the positions and adds the sampled bytes and a status per
//! item, always fits the general bound.

use bincode::Options;

use crate::envelope::{Envelope, Payload};
use crate::errors::CodecError;

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// Upper bound on an encoded envelope, in bytes.
pub const MAX_ENVELOPE_SIZE: u64 = 16 * 1024 * 1024;

/// Upper bound on an encoded sample request, in bytes.
///
/// A response item adds at most its positions' encoded size (one byte per
/// position plus a length prefix no wider than the positions' prefix) and a
/// status of at most 10 bytes. A request item is at least 3 bytes, so a
/// sample response is under five times its request and any request within
/// this bound gets a response within [`MAX_ENVELOPE_SIZE`].
pub const MAX_SAMPLE_REQUEST_SIZE: u64 = MAX_ENVELOPE_SIZE / 8;

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_ENVELOPE_SIZE)
}

fn size_limit(payload: &Payload) -> u64 {
    match payload {
        Payload::SampleRequest(_) => MAX_SAMPLE_REQUEST_SIZE,
        _ => MAX_ENVELOPE_SIZE,
    }
}

fn check_size(payload: &Payload, size: usize) -> Result<(), CodecError> {
    let limit = size_limit(payload);
    if size as u64 > limit {
        return Err(CodecError::TooLarge {
            kind: payload.kind().name(),
            size: size as u64,
            limit,
        });
    }
    Ok(())
}

/// Encode an envelope.
///
/// # Errors
///
/// - `CodecError::UnsupportedVersion` if the envelope is not stamped with
///   [`PROTOCOL_VERSION`]
/// - `CodecError::Encode` if serialization fails or exceeds [`MAX_ENVELOPE_SIZE`]
/// - `CodecError::TooLarge` for a sample request over [`MAX_SAMPLE_REQUEST_SIZE`]
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    if envelope.version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion {
            received: envelope.version,
            supported: PROTOCOL_VERSION,
        });
    }
    let bytes = wire_options()
        .serialize(envelope)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    check_size(&envelope.payload, bytes.len())?;
    Ok(bytes)
}

/// Decode an envelope.
///
/// The version prefix is checked before the payload is looked at.
///
/// # Errors
///
/// - `CodecError::UnsupportedVersion` for any version other than the current one
/// - `CodecError::Decode` for malformed bytes or an unknown message kind
/// - `CodecError::TooLarge` for a sample request over [`MAX_SAMPLE_REQUEST_SIZE`]
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let version: u16 = wire_options()
        .allow_trailing_bytes()
        .deserialize(bytes)
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    if version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion {
            received: version,
            supported: PROTOCOL_VERSION,
        });
    }

    let envelope: Envelope = wire_options()
        .deserialize(bytes)
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    check_size(&envelope.payload, bytes.len())?;
    Ok(envelope)
}
