//! fsindex Daemon
//!
//! Background process that keeps a search engine index in sync with one or
//! more directory trees.

mod daemon;
mod signals;

use anyhow::{Context, Result};
use fsindex_core::IndexerConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use daemon::Daemon;

/// Environment variable naming an explicit config file
const CONFIG_ENV: &str = "FSINDEX_CONFIG";

/// Run the daemon
pub async fn run(config: IndexerConfig) -> Result<()> {
    let daemon = Daemon::new(config);
    daemon.run().await
}

fn main() -> Result<()> {
    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let config = IndexerConfig::resolve(config_path.as_deref())
        .context("Failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "daemon_starting");

    // Run async runtime
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}
