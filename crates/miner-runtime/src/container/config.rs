//! # Node Configuration
//!
//! Runtime parameters for a miner node, with defaults and `MINER_*`
//! environment overrides.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `MINER_NODE_ID` | `identity.node_id` |
//! | `MINER_WALLET_ADDRESS` | `identity.wallet_address` |
//! | `MINER_ROLE` | `identity.role` |
//! | `MINER_HEARTBEAT_SECS` | `runtime.heartbeat_interval` |
//! | `MINER_RETRY_DELAY_MS` | `runtime.retry_delay` |
//! | `MINER_MAX_INFLIGHT` | `runtime.max_inflight_handlers` |
//! | `MINER_DATA_DIR` | `storage.data_dir` |
//! | `MINER_SOURCE_DIR` | `storage.source_dir` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use shared_types::{NodeId, NodeRole};
use thiserror::Error;
use tracing::{info, warn};

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub identity: IdentityConfig,
    pub runtime: RuntimeConfig,
    pub storage: StorageConfig,
}

impl NodeConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden from `lookup`. Malformed values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(node_id) = lookup("MINER_NODE_ID").filter(|v| !v.is_empty()) {
            config.identity.node_id = Some(node_id);
        }
        if let Some(wallet) = lookup("MINER_WALLET_ADDRESS") {
            config.identity.wallet_address = wallet;
        }
        if let Some(role) = parse_var(&lookup, "MINER_ROLE") {
            config.identity.role = role;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "MINER_HEARTBEAT_SECS") {
            config.runtime.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(millis) = parse_var::<u64>(&lookup, "MINER_RETRY_DELAY_MS") {
            config.runtime.retry_delay = Duration::from_millis(millis);
        }
        if let Some(cap) = parse_var(&lookup, "MINER_MAX_INFLIGHT") {
            config.runtime.max_inflight_handlers = cap;
        }
        if let Some(dir) = lookup("MINER_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("MINER_SOURCE_DIR") {
            config.storage.source_dir = PathBuf::from(dir);
        }

        config
    }

    /// Reject configurations the runtime cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroHeartbeatInterval);
        }
        if self.runtime.max_inflight_handlers == 0 {
            return Err(ConfigError::ZeroInflightCap);
        }
        if self.identity.role == NodeRole::Miner && self.identity.wallet_address.trim().is_empty() {
            return Err(ConfigError::MissingWalletAddress);
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => {
            info!("Loaded {} from environment", key);
            Some(value)
        }
        Err(_) => {
            warn!("Ignoring malformed {}={:?}", key, raw);
            None
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Heartbeat interval must be greater than zero (MINER_HEARTBEAT_SECS)")]
    ZeroHeartbeatInterval,

    #[error("In-flight handler cap must be greater than zero (MINER_MAX_INFLIGHT)")]
    ZeroInflightCap,

    #[error("Miners must announce a wallet address (MINER_WALLET_ADDRESS)")]
    MissingWalletAddress,
}

/// Node identity and announcement.
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    /// Stable node identifier. A random one is generated when unset.
    pub node_id: Option<String>,
    /// Wallet announced in heartbeats.
    pub wallet_address: String,
    pub role: NodeRole,
}

impl IdentityConfig {
    /// The configured node id, or a fresh random one.
    pub fn resolve_node_id(&self) -> NodeId {
        match &self.node_id {
            Some(id) => NodeId::new(id.clone()),
            None => NodeId::new(uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Loop timing and concurrency limits.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Period of the heartbeat loop.
    pub heartbeat_interval: Duration,
    /// Pause before retrying after a receive error.
    pub retry_delay: Duration,
    /// Maximum handler invocations running at once.
    pub max_inflight_handlers: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
            max_inflight_handlers: num_cpus::get() * 4,
        }
    }
}

/// Content store locations.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Local objects and retention markers.
    pub data_dir: PathBuf,
    /// Directory objects are retrieved from.
    pub source_dir: PathBuf,
    /// Minimum disk space percentage before rejecting fetches.
    pub min_disk_space_percent: u8,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            source_dir: PathBuf::from("./source"),
            min_disk_space_percent: 5,
        }
    }
}
