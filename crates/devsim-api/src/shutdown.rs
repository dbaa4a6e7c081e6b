//! Graceful shutdown handling for the web server.

use std::time::Duration;

use crate::server::ServerState;

/// Shutdown timeout in seconds.
const SHUTDOWN_TIMEOUT: u64 = 30;

/// Wait for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Drain the provisioning worker before exit.
pub async fn cleanup_resources(state: &ServerState) {
    tracing::info!("Draining provisioning queue...");
    state.provisioner.shutdown().await;

    tracing::info!("Server uptime: {} seconds", state.uptime());
}

/// Run cleanup, giving up after [`SHUTDOWN_TIMEOUT`] seconds.
pub async fn shutdown_with_timeout(state: &ServerState) {
    match tokio::time::timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT),
        cleanup_resources(state),
    )
    .await
    {
        Ok(()) => tracing::info!("Resources cleaned up successfully"),
        Err(_) => tracing::warn!("Cleanup timed out after {} seconds", SHUTDOWN_TIMEOUT),
    }
}
