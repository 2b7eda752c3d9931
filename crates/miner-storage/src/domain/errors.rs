//! # Domain Errors

use std::fmt;

use shared_types::{ContentId, StoreError};
use thiserror::Error;

/// Step of a fetch that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// Pulling the object from the store into local storage.
    Retrieve,
    /// Marking the local copy retained.
    Retain,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrieve => f.write_str("retrieve"),
            Self::Retain => f.write_str("retain"),
        }
    }
}

/// A fetch failed. Covers both retrieval and retention failures.
///
/// Handlers turn this into `FetchStatus::Error`; it never reaches the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to {stage} {content_id}: {source}")]
pub struct FetchError {
    pub content_id: ContentId,
    pub stage: FetchStage,
    #[source]
    pub source: StoreError,
}

impl FetchError {
    pub fn new(content_id: ContentId, stage: FetchStage, source: StoreError) -> Self {
        Self {
            content_id,
            stage,
            source,
        }
    }
}
