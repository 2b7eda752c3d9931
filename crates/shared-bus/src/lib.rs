//! # Shared Bus - Publish/Subscribe Capability
//!
//! The narrow interface a miner node needs from its messaging transport, and
//! an in-process implementation of it.
//!
//! ## Capability
//!
//! ```text
//! join(topic) ──→ TopicHandle ──┬──→ subscribe(handle) ──→ Subscription::next()
//!                               ├──→ publish(handle, bytes)
//!                               └──→ close(handle)
//! ```
//!
//! Inbound messages carry the sender's [`NodeId`](shared_types::NodeId) as
//! observed by the transport; payloads are opaque bytes.
//!
//! ## In-Process Bus
//!
//! [`InMemoryNetwork`] is a hub shared by any number of peers. Each peer gets
//! an [`InMemoryPubSub`] bound to its identity via [`InMemoryNetwork::connect`],
//! so several nodes can exchange messages inside one process.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod publisher;
pub mod pubsub;
pub mod subscriber;

pub use publisher::{InMemoryNetwork, InMemoryPubSub};
pub use pubsub::{InboundMessage, PubSub, TopicHandle};
pub use subscriber::{InMemorySubscription, Subscription, SubscriptionError};

/// Messages buffered per topic before slow subscribers start lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
