//! # Miner Runtime Library
//!
//! Exposes the node's building blocks for the `miner-node` binary and for
//! integration tests.
//!
//! ## Message Flow
//!
//! ```text
//! bus ──bytes──→ receive loop ──decode──→ Dispatcher ──kind──→ handler
//!                     │                                          │
//!                     │ (bounded, one task per message)          ↓
//!                     │                              ContentApi (fetch / sample)
//!                     │                                          │
//!                     │                                          ↓
//!                     │                     MessagePublisher ──→ sender's inbox
//!                     │
//! heartbeat loop ──every period──→ MessagePublisher ──→ v1/miner/heartbeat
//! ```
//!
//! ## Modules
//!
//! - `container/` - Node configuration
//! - `adapters/` - Outbound publishing over the bus
//! - `handlers/` - Dispatcher and message handlers
//! - `runtime` - Receive loop, heartbeat loop and shutdown

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod runtime;

pub use adapters::{BusPublisher, MessagePublisher, PublishError};
pub use container::{ConfigError, NodeConfig};
pub use handlers::{
    DispatchOutcome, Dispatcher, FetchFileHandler, HandlerError, MessageHandler, WindowPostHandler,
};
pub use runtime::{MinerRuntime, RuntimeError, RuntimeTasks};
