//! # Node Container
//!
//! Configuration shared by the runtime and the binary.

pub mod config;

pub use config::{ConfigError, IdentityConfig, NodeConfig, RuntimeConfig, StorageConfig};
