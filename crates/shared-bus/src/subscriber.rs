//! # Subscriber
//!
//! Defines the subscription side of the bus.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::publisher::Hub;
use crate::pubsub::InboundMessage;

/// Errors from receiving on a subscription.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The subscriber fell behind; this many messages were dropped for it.
    #[error("Subscriber lagged, {0} messages dropped")]
    Lagged(u64),

    /// The topic was torn down.
    #[error("Subscription closed")]
    Closed,

    /// Transport-specific receive failure.
    #[error("Receive failed: {0}")]
    Transport(String),
}

/// Inbound stream of messages on one topic.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next message.
    ///
    /// Errors are not terminal: callers may keep calling `next` after one.
    async fn next(&mut self) -> Result<InboundMessage, SubscriptionError>;

    /// Topic this subscription listens on.
    fn topic(&self) -> &str;
}

/// Subscription handed out by [`InMemoryPubSub`](crate::InMemoryPubSub).
///
/// When dropped, the hub's subscriber count for the topic is decremented.
pub struct InMemorySubscription {
    stream: BroadcastStream<InboundMessage>,
    topic: String,
    hub: Arc<Hub>,
}

impl InMemorySubscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<InboundMessage>,
        topic: String,
        hub: Arc<Hub>,
    ) -> Self {
        Self {
            stream: BroadcastStream::new(receiver),
            topic,
            hub,
        }
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> Result<InboundMessage, SubscriptionError> {
        use tokio_stream::StreamExt;

        match self.stream.next().await {
            Some(Ok(message)) => Ok(message),
            Some(Err(BroadcastStreamRecvError::Lagged(count))) => {
                debug!(topic = %self.topic, lagged = count, "Subscriber lagged, some messages dropped");
                Err(SubscriptionError::Lagged(count))
            }
            None => Err(SubscriptionError::Closed),
        }
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        self.hub.release_subscription(&self.topic);
        debug!(topic = %self.topic, "Subscription dropped");
    }
}
