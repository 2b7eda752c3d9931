//! # In-Memory Bus
//!
//! Process-local implementation of [`PubSub`].
//!
//! Uses one `tokio::sync::broadcast` channel per topic for multi-producer,
//! multi-consumer semantics. Suitable for tests and single-process
//! deployments; networked deployments plug a different [`PubSub`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use shared_types::{BusError, NodeId};
use tokio::sync::broadcast;
use tracing::debug;

use crate::pubsub::{InboundMessage, PubSub, TopicHandle};
use crate::subscriber::{InMemorySubscription, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;

struct TopicState {
    sender: broadcast::Sender<InboundMessage>,
    /// Open handles on this topic.
    handles: usize,
    /// Live subscriptions on this topic.
    subscriptions: usize,
}

/// State shared by every peer of one [`InMemoryNetwork`].
pub(crate) struct Hub {
    topics: RwLock<HashMap<String, TopicState>>,
    /// Open handle id -> topic.
    handles: RwLock<HashMap<u64, String>>,
    next_handle: AtomicU64,
    messages_published: AtomicU64,
    capacity: usize,
}

impl Hub {
    fn topics(&self) -> RwLockWriteGuard<'_, HashMap<String, TopicState>> {
        self.topics.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn handles(&self) -> RwLockWriteGuard<'_, HashMap<u64, String>> {
        self.handles.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_open(&self, handle: &TopicHandle) -> bool {
        self.handles()
            .get(&handle.id())
            .is_some_and(|topic| topic == handle.topic())
    }

    pub(crate) fn release_subscription(&self, topic: &str) {
        let mut topics = self.topics();
        if let Some(state) = topics.get_mut(topic) {
            state.subscriptions = state.subscriptions.saturating_sub(1);
            if state.handles == 0 && state.subscriptions == 0 {
                topics.remove(topic);
            }
        }
    }
}

/// Process-local bus shared by any number of peers.
///
/// Cloning is cheap; clones refer to the same hub.
#[derive(Clone)]
pub struct InMemoryNetwork {
    hub: Arc<Hub>,
}

impl InMemoryNetwork {
    /// Create a network with the default per-topic capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a network buffering `capacity` messages per topic.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            hub: Arc::new(Hub {
                topics: RwLock::new(HashMap::new()),
                handles: RwLock::new(HashMap::new()),
                next_handle: AtomicU64::new(1),
                messages_published: AtomicU64::new(0),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Attach a peer publishing under `node`.
    #[must_use]
    pub fn connect(&self, node: NodeId) -> InMemoryPubSub {
        debug!(node = %node, "Peer connected to in-memory network");
        InMemoryPubSub {
            node,
            hub: Arc::clone(&self.hub),
        }
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.hub
            .topics()
            .get(topic)
            .map_or(0, |state| state.subscriptions)
    }

    /// Number of topics with at least one open handle or subscription.
    #[must_use]
    pub fn open_topics(&self) -> usize {
        self.hub.topics().len()
    }

    /// Number of open topic handles across all peers.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.hub.handles().len()
    }

    /// Total messages published across all peers.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.hub.messages_published.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.hub.capacity
    }
}

impl Default for InMemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// One peer's view of an [`InMemoryNetwork`].
pub struct InMemoryPubSub {
    node: NodeId,
    hub: Arc<Hub>,
}

#[async_trait]
impl PubSub for InMemoryPubSub {
    fn local_id(&self) -> &NodeId {
        &self.node
    }

    async fn join(&self, topic: &str) -> Result<TopicHandle, BusError> {
        let id = self.hub.next_handle.fetch_add(1, Ordering::Relaxed);
        {
            let mut topics = self.hub.topics();
            let state = topics.entry(topic.to_string()).or_insert_with(|| TopicState {
                sender: broadcast::channel(self.hub.capacity).0,
                handles: 0,
                subscriptions: 0,
            });
            state.handles += 1;
        }
        self.hub.handles().insert(id, topic.to_string());

        debug!(node = %self.node, topic = topic, handle = id, "Topic joined");
        Ok(TopicHandle::new(topic, id))
    }

    async fn subscribe(&self, handle: &TopicHandle) -> Result<Box<dyn Subscription>, BusError> {
        if !self.hub.is_open(handle) {
            return Err(BusError::Subscribe {
                topic: handle.topic().to_string(),
                reason: "topic handle is closed".to_string(),
            });
        }

        let receiver = {
            let mut topics = self.hub.topics();
            let Some(state) = topics.get_mut(handle.topic()) else {
                return Err(BusError::Subscribe {
                    topic: handle.topic().to_string(),
                    reason: "topic not joined".to_string(),
                });
            };
            state.subscriptions += 1;
            state.sender.subscribe()
        };

        debug!(node = %self.node, topic = %handle.topic(), "New subscription created");
        Ok(Box::new(InMemorySubscription::new(
            receiver,
            handle.topic().to_string(),
            Arc::clone(&self.hub),
        )))
    }

    async fn publish(&self, handle: &TopicHandle, data: Vec<u8>) -> Result<(), BusError> {
        if !self.hub.is_open(handle) {
            return Err(BusError::Publish {
                topic: handle.topic().to_string(),
                reason: "topic handle is closed".to_string(),
            });
        }

        let sender = match self.hub.topics().get(handle.topic()) {
            Some(state) => state.sender.clone(),
            None => {
                return Err(BusError::Publish {
                    topic: handle.topic().to_string(),
                    reason: "topic not joined".to_string(),
                })
            }
        };

        self.hub.messages_published.fetch_add(1, Ordering::Relaxed);
        let message = InboundMessage {
            sender: self.node.clone(),
            data,
        };

        match sender.send(message) {
            Ok(receivers) => {
                debug!(topic = %handle.topic(), receivers = receivers, "Message published");
            }
            Err(_) => {
                // Pub/sub semantics: nobody listening is not a failure.
                debug!(topic = %handle.topic(), "Message dropped (no receivers)");
            }
        }
        Ok(())
    }

    async fn close(&self, handle: TopicHandle) {
        if self.hub.handles().remove(&handle.id()).is_none() {
            return;
        }

        let mut topics = self.hub.topics();
        if let Some(state) = topics.get_mut(handle.topic()) {
            state.handles = state.handles.saturating_sub(1);
            if state.handles == 0 && state.subscriptions == 0 {
                topics.remove(handle.topic());
            }
        }
        debug!(node = %self.node, topic = %handle.topic(), handle = handle.id(), "Topic closed");
    }
}
