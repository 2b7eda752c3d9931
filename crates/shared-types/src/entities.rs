//! # Core Entities
//!
//! Identifiers shared by the protocol, the content store and the runtime.
//!
//! - **Content**: `ContentId` (content-addressed object identifier)
//! - **Networking**: `NodeId` (peer identity as reported by the bus)
//! - **Roles**: `NodeRole` (announced in heartbeats)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::IdentifierError;

/// Maximum length of a content identifier in characters.
pub const MAX_CONTENT_ID_LEN: usize = 128;

/// Prefix of identifiers produced by [`ContentId::digest`].
pub const DIGEST_PREFIX: &str = "sha256-";

/// A content-addressed identifier for an immutable object.
///
/// Accepted characters are ASCII alphanumerics, `-` and `_`, which keeps the
/// identifier safe to embed in topic names and file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    /// Validate and wrap a raw identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if raw.len() > MAX_CONTENT_ID_LEN {
            return Err(IdentifierError::TooLong {
                len: raw.len(),
                max: MAX_CONTENT_ID_LEN,
            });
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(IdentifierError::InvalidCharacter(c));
        }
        Ok(Self(raw))
    }

    /// Derive the content address of `bytes`.
    #[must_use]
    pub fn digest(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        Self(format!("{}{}", DIGEST_PREFIX, hex::encode(hash)))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentId> for String {
    fn from(value: ContentId) -> Self {
        value.0
    }
}

/// Identity of a node on the pub/sub bus.
///
/// Opaque to this crate: the bus decides what a peer identifier looks like,
/// the runtime only embeds it in topic names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Role a node announces in its heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeRole {
    /// Stores content and answers sampling challenges.
    #[default]
    Miner,
    /// Issues challenges and checks miner responses.
    Inspector,
}

impl NodeRole {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Miner => "miner",
            Self::Inspector => "inspector",
        }
    }
}

impl FromStr for NodeRole {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "miner" => Ok(Self::Miner),
            "inspector" => Ok(Self::Inspector),
            _ => Err(IdentifierError::UnknownRole(s.to_string())),
        }
    }
}
