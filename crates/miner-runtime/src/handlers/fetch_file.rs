//! # FetchFile Handler
//!
//! Fetches and retains the requested object, then reports the outcome to the
//! requester's inbox. Store failures become `FetchStatus::Error` in the
//! response; they are never returned as handler errors.

use std::sync::Arc;

use async_trait::async_trait;
use miner_storage::ContentApi;
use shared_types::{
    inbox_topic, Envelope, FetchResponse, FetchStatus, MessageKind, NodeId, Payload,
};
use tracing::{info, warn};

use crate::adapters::MessagePublisher;
use crate::handlers::registry::{HandlerError, MessageHandler};

pub struct FetchFileHandler {
    content: Arc<dyn ContentApi>,
    publisher: Arc<dyn MessagePublisher>,
}

impl FetchFileHandler {
    pub fn new(content: Arc<dyn ContentApi>, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { content, publisher }
    }
}

#[async_trait]
impl MessageHandler for FetchFileHandler {
    async fn handle(&self, sender: &NodeId, envelope: Envelope) -> Result<(), HandlerError> {
        let Payload::FetchRequest(request) = &envelope.payload else {
            return Err(HandlerError::UnexpectedPayload {
                expected: MessageKind::FetchFile,
                received: envelope.kind(),
            });
        };
        let content_id = request.content_id.clone();

        let status = match self.content.fetch(&content_id).await {
            Ok(()) => FetchStatus::Ok,
            Err(e) => {
                warn!(cid = %content_id, sender = %sender, error = %e, "[fetch] Fetch failed");
                FetchStatus::Error
            }
        };

        let response = envelope.reply(Payload::FetchResponse(FetchResponse {
            content_id: content_id.clone(),
            status,
        }));
        self.publisher.publish(&inbox_topic(sender), &response).await?;

        info!(
            cid = %content_id,
            sender = %sender,
            nonce = ?response.nonce,
            status = ?status,
            "[fetch] Response sent"
        );
        Ok(())
    }
}
