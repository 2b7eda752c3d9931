//! # Adapter Implementations
//!
//! Outbound adapters connecting handlers and loops to the bus.

pub mod publisher;

pub use publisher::{BusPublisher, MessagePublisher, PublishError};
