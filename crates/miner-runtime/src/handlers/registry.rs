//! # Dispatcher
//!
//! Routes decoded envelopes to the handler registered for their kind.
//!
//! - Unregistered kinds are logged and dropped: no handler runs and nothing
//!   is published.
//! - [`Dispatcher::dispatch`] runs the handler on its own task so a panic is
//!   reported as [`HandlerError::Panicked`] instead of unwinding into the caller.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{Envelope, MessageKind, NodeId};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::adapters::PublishError;

/// Errors from a handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The envelope's payload does not match the handler's kind.
    #[error("Handler for {expected} received a {received} payload")]
    UnexpectedPayload {
        expected: MessageKind,
        received: MessageKind,
    },

    /// The response could not be published.
    #[error("Failed to publish response: {0}")]
    Publish(#[from] PublishError),

    /// The handler panicked.
    #[error("Handler for {kind} panicked: {message}")]
    Panicked { kind: MessageKind, message: String },

    /// The handler task was cancelled before completing.
    #[error("Handler for {kind} was cancelled")]
    Cancelled { kind: MessageKind },
}

/// Handles envelopes of one kind.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process `envelope`, received from `sender`.
    async fn handle(&self, sender: &NodeId, envelope: Envelope) -> Result<(), HandlerError>;
}

/// What the dispatcher did with an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran to completion.
    Handled,
    /// No handler is registered for this kind; the envelope was dropped.
    Unregistered(MessageKind),
}

/// Message kind to handler mapping.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<MessageKind, Arc<dyn MessageHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: MessageKind, handler: Arc<dyn MessageHandler>) {
        if self.handlers.insert(kind, handler).is_some() {
            warn!(kind = %kind, "[dispatch] Replaced existing handler");
        }
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_handler(mut self, kind: MessageKind, handler: Arc<dyn MessageHandler>) -> Self {
        self.register(kind, handler);
        self
    }

    pub fn is_registered(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Route `envelope` to its handler on the current task.
    pub async fn handle(
        &self,
        sender: &NodeId,
        envelope: Envelope,
    ) -> Result<DispatchOutcome, HandlerError> {
        let kind = envelope.kind();
        let Some(handler) = self.handlers.get(&kind) else {
            warn!(
                kind = %kind,
                sender = %sender,
                nonce = ?envelope.nonce,
                "[dispatch] No handler registered, dropping message"
            );
            return Ok(DispatchOutcome::Unregistered(kind));
        };

        debug!(kind = %kind, sender = %sender, nonce = ?envelope.nonce, "[dispatch] Invoking handler");
        handler.handle(sender, envelope).await?;
        Ok(DispatchOutcome::Handled)
    }

    /// Route `envelope` on a dedicated task, converting a handler panic into
    /// [`HandlerError::Panicked`].
    pub async fn dispatch(
        self: Arc<Self>,
        sender: NodeId,
        envelope: Envelope,
    ) -> Result<DispatchOutcome, HandlerError> {
        let kind = envelope.kind();
        let task = tokio::spawn(async move { self.handle(&sender, envelope).await });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                error!(kind = %kind, panic = %message, "[dispatch] Handler panicked");
                Err(HandlerError::Panicked { kind, message })
            }
            Err(_) => Err(HandlerError::Cancelled { kind }),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}
