//! # WindowPost Handler
//!
//! Samples the requested offsets of retained objects and returns the bytes to
//! the requester's inbox. Sampling never fails as a whole; per-item problems
//! are carried in each item's status.

use std::sync::Arc;

use async_trait::async_trait;
use miner_storage::ContentApi;
use shared_types::{
    inbox_topic, Envelope, MessageKind, NodeId, Payload, SampleResponse, SampleStatus,
};
use tracing::info;

use crate::adapters::MessagePublisher;
use crate::handlers::registry::{HandlerError, MessageHandler};

pub struct WindowPostHandler {
    content: Arc<dyn ContentApi>,
    publisher: Arc<dyn MessagePublisher>,
}

impl WindowPostHandler {
    pub fn new(content: Arc<dyn ContentApi>, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { content, publisher }
    }
}

#[async_trait]
impl MessageHandler for WindowPostHandler {
    async fn handle(&self, sender: &NodeId, envelope: Envelope) -> Result<(), HandlerError> {
        let Payload::SampleRequest(request) = &envelope.payload else {
            return Err(HandlerError::UnexpectedPayload {
                expected: MessageKind::WindowPost,
                received: envelope.kind(),
            });
        };

        let items = self.content.sample(&request.items).await;
        let complete = items
            .iter()
            .filter(|item| item.status == SampleStatus::Ok)
            .count();
        let total = items.len();

        let response = envelope.reply(Payload::SampleResponse(SampleResponse { items }));
        self.publisher.publish(&inbox_topic(sender), &response).await?;

        info!(
            sender = %sender,
            nonce = ?response.nonce,
            items = total,
            complete = complete,
            "[sample] Response sent"
        );
        Ok(())
    }
}
