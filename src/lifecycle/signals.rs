//! OS signal handling.
//!
//! Translates SIGINT and SIGTERM into the internal shutdown signal so the
//! server drains in-flight requests before exiting.

use std::sync::Arc;

use crate::lifecycle::Shutdown;

/// Wait for a termination signal, then trigger shutdown.
pub async fn listen_for_signals(shutdown: Arc<Shutdown>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(error) => {
                tracing::error!(%error, "failed to register SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
    }
    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received ctrl-c, shutting down");
        }
    }
    shutdown.trigger();
}
