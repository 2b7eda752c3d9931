//! # Outbound Ports (Driven Ports)
//!
//! Capabilities required from the content store.
//!
//! Production: `FsContentStore` (adapters/filesystem.rs)
//! Testing: `InMemoryContentStore` (adapters/memory.rs)

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use shared_types::{ContentId, StoreError};
use tokio::io::{AsyncRead, AsyncSeek};

/// Seekable byte source for an opened object.
pub trait ContentRead: AsyncRead + AsyncSeek + Unpin + Send {}

impl<T: AsyncRead + AsyncSeek + Unpin + Send> ContentRead for T {}

/// A retained object opened for reading.
pub struct OpenedContent {
    /// Object length in bytes.
    pub size: u64,
    pub reader: Box<dyn ContentRead>,
}

impl fmt::Debug for OpenedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedContent")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// The distributed content store as seen by one node.
///
/// Retention state and object bytes are owned by the store; callers never
/// cache them.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Pull the full object into local storage. Returns its size.
    ///
    /// Fetching an object that is already local succeeds without copying.
    async fn fetch(&self, content_id: &ContentId) -> Result<u64, StoreError>;

    /// Whether the object is currently retained.
    async fn is_retained(&self, content_id: &ContentId) -> Result<bool, StoreError>;

    /// Every retained id at the time of the call.
    async fn retention_snapshot(&self) -> Result<HashSet<ContentId>, StoreError>;

    /// Mark a locally held object retained.
    async fn retain(&self, content_id: &ContentId) -> Result<(), StoreError>;

    /// Open a retained object for reading.
    async fn open(&self, content_id: &ContentId) -> Result<OpenedContent, StoreError>;
}
