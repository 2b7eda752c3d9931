//! # Miner Node
//!
//! Entry point of a storage miner node.
//!
//! ## Startup Sequence
//!
//! 1. Install the log subscriber (`RUST_LOG`, else `MINER_LOG_LEVEL`, else `info`)
//! 2. Load configuration from `MINER_*` environment variables and validate it
//! 3. Open the filesystem content store
//! 4. Connect to the bus under the node's identity
//! 5. Start the receive and heartbeat loops
//! 6. Run until Ctrl+C, then stop both loops

use std::sync::Arc;

use anyhow::{Context, Result};
use miner_runtime::{MinerRuntime, NodeConfig};
use miner_storage::{ContentService, FsContentStore};
use shared_bus::InMemoryNetwork;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_tracing() -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = std::env::var("MINER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
            EnvFilter::try_new(&level).with_context(|| format!("Invalid MINER_LOG_LEVEL {level:?}"))?
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = NodeConfig::from_env();
    config.validate().context("Invalid node configuration")?;

    let store = FsContentStore::open_at(
        &config.storage.source_dir,
        &config.storage.data_dir,
        config.storage.min_disk_space_percent,
    )
    .await
    .context("Failed to open content store")?;
    let content = Arc::new(ContentService::new(Arc::new(store)));

    // Single-process bus; a networked transport plugs in through `PubSub`.
    let network = InMemoryNetwork::new();
    let bus = Arc::new(network.connect(config.identity.resolve_node_id()));

    let runtime = MinerRuntime::new(&config, bus, content);
    let tasks = runtime.start().await.context("Failed to start runtime")?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown();
    tasks.join().await?;
    info!("Shutdown complete");
    Ok(())
}
