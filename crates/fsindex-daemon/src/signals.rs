//! Signal handling for graceful shutdown.

use tokio::sync::broadcast;

/// Wait for a shutdown signal (SIGINT, SIGTERM or an explicit shutdown)
pub async fn wait_for_shutdown(mut shutdown_rx: broadcast::Receiver<()>) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received_sigint");
        }
        _ = shutdown_rx.recv() => {
            tracing::info!("received_shutdown");
        }
        _ = wait_for_sigterm() => {
            tracing::info!("received_sigterm");
        }
    }
}

/// Wait for SIGTERM signal
#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "sigterm_handler_unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_explicit_shutdown() {
        let (tx, rx) = broadcast::channel(1);
        let waiter = tokio::spawn(wait_for_shutdown(rx));
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
