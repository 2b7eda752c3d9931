//! # Pub/Sub Capability
//!
//! Transport-agnostic publish/subscribe interface.

use async_trait::async_trait;
use shared_types::{BusError, NodeId};

use crate::subscriber::Subscription;

/// A message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Identity of the publishing peer, as observed by the transport.
    pub sender: NodeId,
    /// Opaque payload.
    pub data: Vec<u8>,
}

/// A joined topic. Obtained from [`PubSub::join`], released with [`PubSub::close`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicHandle {
    topic: String,
    id: u64,
}

impl TopicHandle {
    #[must_use]
    pub fn new(topic: impl Into<String>, id: u64) -> Self {
        Self {
            topic: topic.into(),
            id,
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Publish/subscribe transport as seen by one node.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Identity this transport publishes under.
    fn local_id(&self) -> &NodeId;

    /// Join a topic.
    async fn join(&self, topic: &str) -> Result<TopicHandle, BusError>;

    /// Open an inbound stream on a joined topic.
    async fn subscribe(&self, handle: &TopicHandle) -> Result<Box<dyn Subscription>, BusError>;

    /// Publish opaque bytes on a joined topic.
    async fn publish(&self, handle: &TopicHandle, data: Vec<u8>) -> Result<(), BusError>;

    /// Release a topic handle. Subscriptions opened from it stay valid.
    async fn close(&self, handle: TopicHandle);
}
