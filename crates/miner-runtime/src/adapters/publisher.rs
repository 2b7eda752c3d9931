//! # Message Publisher
//!
//! Encodes envelopes and publishes them to a topic.
//!
//! There is no long-lived publish handle: every call joins the destination
//! topic, publishes once and closes the handle again, also when publishing
//! fails.

use std::sync::Arc;

use async_trait::async_trait;
use shared_bus::PubSub;
use shared_types::{encode_envelope, BusError, CodecError, Envelope};
use thiserror::Error;
use tracing::debug;

/// Errors from publishing an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Outbound port for envelopes.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, envelope: &Envelope) -> Result<(), PublishError>;
}

/// [`MessagePublisher`] over a [`PubSub`] transport.
pub struct BusPublisher {
    bus: Arc<dyn PubSub>,
}

impl BusPublisher {
    pub fn new(bus: Arc<dyn PubSub>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl MessagePublisher for BusPublisher {
    async fn publish(&self, topic: &str, envelope: &Envelope) -> Result<(), PublishError> {
        let bytes = encode_envelope(envelope)?;
        let len = bytes.len();

        let handle = self.bus.join(topic).await?;
        let result = self.bus.publish(&handle, bytes).await;
        self.bus.close(handle).await;
        result?;

        debug!(
            topic = topic,
            kind = %envelope.kind(),
            nonce = ?envelope.nonce,
            bytes = len,
            "Envelope published"
        );
        Ok(())
    }
}
