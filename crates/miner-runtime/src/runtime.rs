//! # Miner Runtime
//!
//! Owns the two always-on loops of a miner node.
//!
//! ## Receive Loop
//!
//! 1. Subscribe once to the node's inbox topic
//! 2. Wait for the next message (cancellable)
//! 3. On a receive error, pause for `retry_delay` and try again, forever
//! 4. Decode; undecodable messages are logged and dropped
//! 5. Wait for a dispatch slot (at most `max_inflight_handlers` at once)
//! 6. Dispatch on a new task and go back to 2 without waiting for it
//!
//! ## Heartbeat Loop
//!
//! Publishes a `MinerHeartBeat` to `v1/miner/heartbeat` immediately and then
//! every `heartbeat_interval`.
//!
//! ## Shutdown
//!
//! [`MinerRuntime::shutdown`] stops both loops promptly. Dispatch tasks
//! already running are left to finish on their own.

use std::sync::Arc;
use std::time::Duration;

use miner_storage::ContentApi;
use shared_bus::{PubSub, Subscription, TopicHandle};
use shared_types::{
    decode_envelope, heartbeat_topic, inbox_topic, BusError, Envelope, HeartBeat, MessageKind,
    NodeId, Payload,
};
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::adapters::{BusPublisher, MessagePublisher};
use crate::container::NodeConfig;
use crate::handlers::{
    DispatchOutcome, Dispatcher, FetchFileHandler, HandlerError, WindowPostHandler,
};

/// Errors from starting or joining the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to subscribe to inbox: {0}")]
    Subscribe(#[from] BusError),

    #[error("Runtime task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Handles of the receive and heartbeat loops.
pub struct RuntimeTasks {
    receive: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl RuntimeTasks {
    /// Wait for both loops to exit.
    pub async fn join(self) -> Result<(), RuntimeError> {
        let (receive, heartbeat) = tokio::join!(self.receive, self.heartbeat);
        receive?;
        heartbeat?;
        Ok(())
    }
}

/// The miner node runtime.
pub struct MinerRuntime {
    bus: Arc<dyn PubSub>,
    dispatcher: Arc<Dispatcher>,
    publisher: Arc<dyn MessagePublisher>,
    heartbeat: HeartBeat,
    heartbeat_interval: Duration,
    retry_delay: Duration,
    max_inflight: usize,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl MinerRuntime {
    /// Create a runtime answering `FetchFile` and `WindowPost` from `content`.
    pub fn new(config: &NodeConfig, bus: Arc<dyn PubSub>, content: Arc<dyn ContentApi>) -> Self {
        let publisher: Arc<dyn MessagePublisher> = Arc::new(BusPublisher::new(Arc::clone(&bus)));
        let dispatcher = Dispatcher::new()
            .with_handler(
                MessageKind::FetchFile,
                Arc::new(FetchFileHandler::new(
                    Arc::clone(&content),
                    Arc::clone(&publisher),
                )),
            )
            .with_handler(
                MessageKind::WindowPost,
                Arc::new(WindowPostHandler::new(content, Arc::clone(&publisher))),
            );

        Self::with_dispatcher(config, bus, publisher, dispatcher)
    }

    fn with_dispatcher(
        config: &NodeConfig,
        bus: Arc<dyn PubSub>,
        publisher: Arc<dyn MessagePublisher>,
        dispatcher: Dispatcher,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            bus,
            dispatcher: Arc::new(dispatcher),
            publisher,
            heartbeat: HeartBeat {
                wallet_address: config.identity.wallet_address.clone(),
                role: config.identity.role,
            },
            heartbeat_interval: config.runtime.heartbeat_interval,
            retry_delay: config.runtime.retry_delay,
            max_inflight: config.runtime.max_inflight_handlers.max(1),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        self.bus.local_id()
    }

    /// Subscribe to the inbox and spawn both loops.
    ///
    /// Fails only if the inbox subscription cannot be established.
    pub async fn start(&self) -> Result<RuntimeTasks, RuntimeError> {
        let inbox = inbox_topic(self.node_id());
        let handle = self.bus.join(&inbox).await?;
        let subscription = match self.bus.subscribe(&handle).await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.bus.close(handle).await;
                return Err(e.into());
            }
        };

        info!("===========================================");
        info!("  Miner Node Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");
        info!("Node ID: {}", self.node_id());
        info!("Inbox: {}", inbox);
        info!("Heartbeat every {:?}", self.heartbeat_interval);
        info!("Max in-flight handlers: {}", self.max_inflight);

        let receive = tokio::spawn(
            ReceiveLoop {
                bus: Arc::clone(&self.bus),
                handle,
                subscription,
                dispatcher: Arc::clone(&self.dispatcher),
                slots: Arc::new(Semaphore::new(self.max_inflight)),
                retry_delay: self.retry_delay,
                shutdown: self.shutdown_rx.clone(),
            }
            .run(),
        );

        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(&self.publisher),
            self.heartbeat.clone(),
            self.heartbeat_interval,
            self.shutdown_rx.clone(),
        ));

        Ok(RuntimeTasks { receive, heartbeat })
    }

    /// Signal both loops to stop.
    pub fn shutdown(&self) {
        info!("Initiating shutdown...");
        if self.shutdown_tx.send(true).is_err() {
            debug!("No loops running");
        }
    }
}

/// Resolves once shutdown has been signalled or the runtime is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

struct ReceiveLoop {
    bus: Arc<dyn PubSub>,
    handle: TopicHandle,
    subscription: Box<dyn Subscription>,
    dispatcher: Arc<Dispatcher>,
    slots: Arc<Semaphore>,
    retry_delay: Duration,
    shutdown: watch::Receiver<bool>,
}

impl ReceiveLoop {
    async fn run(mut self) {
        info!(topic = %self.handle.topic(), "[rx] Receive loop started");

        loop {
            let received = tokio::select! {
                biased;
                _ = stopped(&mut self.shutdown) => break,
                received = self.subscription.next() => received,
            };

            let message = match received {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, retry_in = ?self.retry_delay, "[rx] Receive failed, retrying");
                    tokio::select! {
                        biased;
                        _ = stopped(&mut self.shutdown) => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                    continue;
                }
            };

            let envelope = match decode_envelope(&message.data) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(sender = %message.sender, error = %e, "[rx] Dropping undecodable message");
                    continue;
                }
            };

            let permit = tokio::select! {
                biased;
                _ = stopped(&mut self.shutdown) => break,
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            debug!(
                sender = %message.sender,
                kind = %envelope.kind(),
                nonce = ?envelope.nonce,
                "[rx] Message received"
            );

            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                let _permit = permit;
                dispatch(dispatcher, message.sender, envelope).await;
            });
        }

        info!("[rx] Shutdown signal received");
        let Self {
            bus,
            handle,
            subscription,
            ..
        } = self;
        drop(subscription);
        bus.close(handle).await;
    }
}

async fn dispatch(dispatcher: Arc<Dispatcher>, sender: NodeId, envelope: Envelope) {
    let kind = envelope.kind();
    let nonce = envelope.nonce.clone();

    match dispatcher.dispatch(sender.clone(), envelope).await {
        Ok(DispatchOutcome::Handled) => {
            debug!(kind = %kind, nonce = ?nonce, "[dispatch] Message handled");
        }
        Ok(DispatchOutcome::Unregistered(_)) => {}
        Err(HandlerError::Panicked { .. }) => {
            // Already reported by the dispatcher.
        }
        Err(e) => {
            error!(kind = %kind, sender = %sender, nonce = ?nonce, error = %e, "[dispatch] Handler failed");
        }
    }
}

async fn heartbeat_loop(
    publisher: Arc<dyn MessagePublisher>,
    heartbeat: HeartBeat,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let topic = heartbeat_topic();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(topic = %topic, "[heartbeat] Heartbeat loop started");

    loop {
        tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            _ = ticker.tick() => {}
        }

        let envelope = Envelope::new(Payload::HeartBeat(heartbeat.clone()));
        match publisher.publish(&topic, &envelope).await {
            Ok(()) => debug!(wallet = %heartbeat.wallet_address, "[heartbeat] Published"),
            Err(e) => warn!(error = %e, "[heartbeat] Failed to publish"),
        }
    }

    info!("[heartbeat] Shutdown signal received");
}
