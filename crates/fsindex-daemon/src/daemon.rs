//! Daemon lifecycle management.

use anyhow::{Context, Result};
use fsindex_core::{IndexerConfig, PidLock, ScanOrchestrator};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::signals;

/// The main daemon process
pub struct Daemon {
    config: IndexerConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new(config: IndexerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            shutdown_tx,
        }
    }

    /// Run the daemon until its passes finish or a shutdown signal arrives.
    ///
    /// # Errors
    /// Returns error if another instance holds the PID lock, or if a
    /// single-pass run fails.
    pub async fn run(&self) -> Result<()> {
        // Check single instance; the guard removes the PID file on every exit path
        let lock = PidLock::acquire(&self.config.pid_file)?;

        tracing::info!(
            backend = %self.config.engine.backend,
            url = %self.config.engine.url,
            index = %self.config.engine.index,
            roots = self.config.roots.len(),
            interval_secs = self.config.interval_secs,
            pid_file = %lock.path().display(),
            "daemon_started"
        );

        let shutdown = signals::wait_for_shutdown(self.shutdown_tx.subscribe());
        tokio::pin!(shutdown);

        let result = tokio::select! {
            result = self.serve() => result,
            _ = &mut shutdown => {
                tracing::info!("shutdown_requested");
                Ok(())
            }
        };

        drop(lock);
        tracing::info!("cleanup_complete");
        result
    }

    async fn serve(&self) -> Result<()> {
        let client = fsindex_core::connect(&self.config.engine)
            .context("Failed to create engine client")?;
        let mut orchestrator = ScanOrchestrator::prepare(&self.config, client)
            .await
            .context("Failed to prepare scan")?;

        let Some(interval_secs) = self.config.interval_secs else {
            orchestrator.run().await.context("Scan pass failed")?;
            return Ok(());
        };

        let interval = Duration::from_secs(interval_secs);
        loop {
            if let Err(e) = orchestrator.run().await {
                tracing::error!(error = %e, "scan_pass_failed");
            }
            tracing::info!(next_in_secs = interval_secs, "waiting_for_next_pass");
            tokio::time::sleep(interval).await;
        }
    }
}
