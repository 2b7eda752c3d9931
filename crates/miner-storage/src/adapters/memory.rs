//! In-memory content store.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{ContentId, StoreError};

use crate::ports::outbound::{ContentStore, OpenedContent};

#[derive(Default)]
struct Inner {
    /// Objects the store can retrieve.
    remote: HashMap<ContentId, Arc<[u8]>>,
    /// Ids whose source cannot be reached.
    unreachable: HashSet<ContentId>,
    /// Objects copied into local storage.
    local: HashMap<ContentId, Arc<[u8]>>,
    retained: HashSet<ContentId>,
    fetches: u64,
}

/// In-memory content store for unit and integration tests.
///
/// Models a remote side (`insert_remote`) and a local side populated by
/// `fetch`. Local copies are shared, so repeated fetches of one id converge
/// on a single object.
#[derive(Default)]
pub struct InMemoryContentStore {
    inner: RwLock<Inner>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `bytes` retrievable under their content address.
    pub fn insert_remote(&self, bytes: Vec<u8>) -> ContentId {
        let content_id = ContentId::digest(&bytes);
        self.inner
            .write()
            .remote
            .insert(content_id.clone(), Arc::from(bytes));
        content_id
    }

    /// Make `content_id` fail retrieval as unreachable.
    pub fn mark_unreachable(&self, content_id: ContentId) {
        self.inner.write().unreachable.insert(content_id);
    }

    /// Seed a local, retained object. Returns its content address.
    pub fn insert_retained(&self, bytes: Vec<u8>) -> ContentId {
        let content_id = ContentId::digest(&bytes);
        let mut inner = self.inner.write();
        inner.local.insert(content_id.clone(), Arc::from(bytes));
        inner.retained.insert(content_id.clone());
        content_id
    }

    /// Drop the local copy and retention mark of `content_id`.
    pub fn evict(&self, content_id: &ContentId) {
        let mut inner = self.inner.write();
        inner.local.remove(content_id);
        inner.retained.remove(content_id);
    }

    /// Number of distinct objects held locally.
    pub fn local_objects(&self) -> usize {
        self.inner.read().local.len()
    }

    /// Number of `fetch` calls that reached the remote side.
    pub fn fetch_count(&self) -> u64 {
        self.inner.read().fetches
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn fetch(&self, content_id: &ContentId) -> Result<u64, StoreError> {
        let mut inner = self.inner.write();
        inner.fetches += 1;

        if let Some(local) = inner.local.get(content_id) {
            return Ok(local.len() as u64);
        }
        if inner.unreachable.contains(content_id) {
            return Err(StoreError::Unreachable(content_id.to_string()));
        }
        let bytes = inner
            .remote
            .get(content_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(content_id.clone()))?;

        let size = bytes.len() as u64;
        inner.local.insert(content_id.clone(), bytes);
        Ok(size)
    }

    async fn is_retained(&self, content_id: &ContentId) -> Result<bool, StoreError> {
        Ok(self.inner.read().retained.contains(content_id))
    }

    async fn retention_snapshot(&self) -> Result<HashSet<ContentId>, StoreError> {
        Ok(self.inner.read().retained.clone())
    }

    async fn retain(&self, content_id: &ContentId) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.local.contains_key(content_id) {
            return Err(StoreError::NotFound(content_id.clone()));
        }
        inner.retained.insert(content_id.clone());
        Ok(())
    }

    async fn open(&self, content_id: &ContentId) -> Result<OpenedContent, StoreError> {
        let inner = self.inner.read();
        if !inner.retained.contains(content_id) {
            return Err(StoreError::NotRetained(content_id.clone()));
        }
        let bytes = inner
            .local
            .get(content_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(content_id.clone()))?;

        Ok(OpenedContent {
            size: bytes.len() as u64,
            reader: Box::new(Cursor::new(bytes)),
        })
    }
}
