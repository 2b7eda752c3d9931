//! # Inbound Ports (Driving Ports)
//!
//! The API message handlers call into.

use async_trait::async_trait;
use shared_types::{ContentId, SampleRequestItem, SampleResponseItem};

use crate::domain::errors::FetchError;

/// Content Fetcher and Byte Sampler.
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Retrieve `content_id` into local storage and mark it retained.
    ///
    /// Idempotent: fetching an id again converges on the same retained object.
    ///
    /// ## Errors
    ///
    /// - `FetchError` with stage `Retrieve`: the store could not produce the object
    /// - `FetchError` with stage `Retain`: the local copy could not be marked retained
    async fn fetch(&self, content_id: &ContentId) -> Result<(), FetchError>;

    /// Sample one byte at each requested position of each item.
    ///
    /// Always returns one result per item, in request order.
    async fn sample(&self, items: &[SampleRequestItem]) -> Vec<SampleResponseItem>;
}
