//! Test doubles shared by handler tests.

use std::sync::Mutex;

use async_trait::async_trait;
use shared_types::Envelope;

use crate::adapters::{MessagePublisher, PublishError};

/// Publisher that records instead of sending.
#[derive(Default)]
pub struct RecordingPublisher {
    pub sent: Mutex<Vec<(String, Envelope)>>,
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, envelope: &Envelope) -> Result<(), PublishError> {
        self.sent
            .lock()
            .unwrap()
            .push((topic.to_string(), envelope.clone()));
        Ok(())
    }
}
