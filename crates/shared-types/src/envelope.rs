//! # Message Envelope
//!
//! The wrapper for every message exchanged between miners and their peers.
//!
//! ## Protocol Properties
//!
//! - **Versioning**: every envelope carries the protocol `version`.
//! - **Closed kinds**: the payload is a sum type, its variant is the message
//!   kind. There is no runtime type registration.
//! - **Correlation**: requests may carry a caller-chosen `nonce`; responses
//!   built with [`Envelope::reply`] echo it unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::PROTOCOL_VERSION;
use crate::entities::{ContentId, NodeRole};

/// The closed set of message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Fetch and retain a content object.
    FetchFile,
    /// Result of a fetch.
    FetchFileResponse,
    /// Sample bytes of retained objects (window proof-of-storage input).
    WindowPost,
    /// Sampled bytes.
    WindowPostResponse,
    /// Periodic liveness announcement.
    MinerHeartBeat,
}

impl MessageKind {
    /// All message kinds, in discriminant order.
    pub const ALL: [MessageKind; 5] = [
        Self::FetchFile,
        Self::FetchFileResponse,
        Self::WindowPost,
        Self::WindowPostResponse,
        Self::MinerHeartBeat,
    ];

    /// Canonical protocol name of the kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchFile => "FetchFile",
            Self::FetchFileResponse => "FetchFileResp",
            Self::WindowPost => "WindowPost",
            Self::WindowPostResponse => "WindowPostResp",
            Self::MinerHeartBeat => "MinerHeartBeat",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request to fetch a content object and keep it retained locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub content_id: ContentId,
}

/// Outcome of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    Ok,
    Error,
}

/// Response to a [`FetchRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub content_id: ContentId,
    pub status: FetchStatus,
}

/// One object to sample and the offsets to read from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRequestItem {
    pub content_id: ContentId,
    /// Byte offsets, in the order the sampled bytes must be returned.
    /// Signed so that invalid negative offsets reach the sampler intact.
    pub positions: Vec<i64>,
}

/// Request to sample bytes from retained objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SampleRequest {
    pub items: Vec<SampleRequestItem>,
}

/// Per-item sampling outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleStatus {
    /// Every position was read.
    Ok,
    /// The object is not retained by this node; no bytes were read.
    NotRetained,
    /// `position` lies outside the object; bytes before it were kept.
    OutOfRange { position: i64 },
    /// The store failed while opening or reading the object.
    ReadFailed,
}

/// Sampled bytes for one requested object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleResponseItem {
    pub content_id: ContentId,
    pub positions: Vec<i64>,
    /// Aligned with `positions`; shorter than it unless `status` is `Ok`.
    pub sampled_bytes: Vec<u8>,
    pub status: SampleStatus,
}

/// Response to a [`SampleRequest`]; items mirror the request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SampleResponse {
    pub items: Vec<SampleResponseItem>,
}

/// Liveness announcement published on the shared heartbeat topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartBeat {
    pub wallet_address: String,
    pub role: NodeRole,
}

/// Message payload. The variant is the message kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    FetchRequest(FetchRequest),
    FetchResponse(FetchResponse),
    SampleRequest(SampleRequest),
    SampleResponse(SampleResponse),
    HeartBeat(HeartBeat),
}

impl Payload {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::FetchRequest(_) => MessageKind::FetchFile,
            Self::FetchResponse(_) => MessageKind::FetchFileResponse,
            Self::SampleRequest(_) => MessageKind::WindowPost,
            Self::SampleResponse(_) => MessageKind::WindowPostResponse,
            Self::HeartBeat(_) => MessageKind::MinerHeartBeat,
        }
    }
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version. Checked by the codec before the payload is decoded.
    pub version: u16,

    /// Caller-supplied correlation token, echoed by responses.
    pub nonce: Option<String>,

    pub payload: Payload,
}

impl Envelope {
    /// Create an envelope without a nonce.
    #[must_use]
    pub fn new(payload: Payload) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            nonce: None,
            payload,
        }
    }

    /// Create an envelope carrying a correlation nonce.
    #[must_use]
    pub fn with_nonce(payload: Payload, nonce: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            nonce: Some(nonce.into()),
            payload,
        }
    }

    /// Build a response to this envelope, echoing its nonce.
    #[must_use]
    pub fn reply(&self, payload: Payload) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            nonce: self.nonce.clone(),
            payload,
        }
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}
