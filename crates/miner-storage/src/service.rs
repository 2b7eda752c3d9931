//! # Content Service
//!
//! Implements [`ContentApi`] on top of any [`ContentStore`].

use std::collections::HashSet;
use std::io::SeekFrom;
use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{ContentId, SampleRequestItem, SampleResponseItem, SampleStatus};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use crate::domain::errors::{FetchError, FetchStage};
use crate::domain::sampling::{finish, not_retained, resolve_offset};
use crate::ports::inbound::ContentApi;
use crate::ports::outbound::{ContentRead, ContentStore};

/// Content Fetcher and Byte Sampler.
pub struct ContentService {
    store: Arc<dyn ContentStore>,
}

impl ContentService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    async fn sample_item(
        &self,
        item: &SampleRequestItem,
        retained: &HashSet<ContentId>,
    ) -> SampleResponseItem {
        let content_id = &item.content_id;
        if !retained.contains(content_id) {
            debug!(cid = %content_id, "[sample] Content not retained");
            return not_retained(item);
        }

        let mut opened = match self.store.open(content_id).await {
            Ok(opened) => opened,
            Err(e) => {
                warn!(cid = %content_id, error = %e, "[sample] Failed to open content");
                return finish(item, Vec::new(), SampleStatus::ReadFailed);
            }
        };

        let mut sampled = Vec::with_capacity(item.positions.len());
        for &position in &item.positions {
            let offset = match resolve_offset(position, opened.size) {
                Ok(offset) => offset,
                Err(status) => {
                    warn!(
                        cid = %content_id,
                        position = position,
                        size = opened.size,
                        "[sample] Position out of range"
                    );
                    return finish(item, sampled, status);
                }
            };

            match read_byte_at(opened.reader.as_mut(), offset).await {
                Ok(byte) => sampled.push(byte),
                Err(e) => {
                    warn!(cid = %content_id, offset = offset, error = %e, "[sample] Read failed");
                    return finish(item, sampled, SampleStatus::ReadFailed);
                }
            }
        }

        finish(item, sampled, SampleStatus::Ok)
    }
}

async fn read_byte_at(reader: &mut dyn ContentRead, offset: u64) -> std::io::Result<u8> {
    reader.seek(SeekFrom::Start(offset)).await?;
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte).await?;
    Ok(byte[0])
}

#[async_trait]
impl ContentApi for ContentService {
    async fn fetch(&self, content_id: &ContentId) -> Result<(), FetchError> {
        let size = self
            .store
            .fetch(content_id)
            .await
            .map_err(|e| FetchError::new(content_id.clone(), FetchStage::Retrieve, e))?;

        self.store
            .retain(content_id)
            .await
            .map_err(|e| FetchError::new(content_id.clone(), FetchStage::Retain, e))?;

        info!(cid = %content_id, bytes = size, "[fetch] Content retained");
        Ok(())
    }

    async fn sample(&self, items: &[SampleRequestItem]) -> Vec<SampleResponseItem> {
        let retained = match self.store.retention_snapshot().await {
            Ok(retained) => retained,
            Err(e) => {
                warn!(error = %e, "[sample] Failed to query retained content");
                return items
                    .iter()
                    .map(|item| finish(item, Vec::new(), SampleStatus::ReadFailed))
                    .collect();
            }
        };

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.sample_item(item, &retained).await);
        }
        results
    }
}
