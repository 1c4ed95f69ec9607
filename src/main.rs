//! Multi-tenant path-prefix reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌────────────────────────────────────────────┐
//!                          │                PORTAL PROXY                 │
//!                          │                                             │
//!   GET /blog/posts ───────┼─▶ http::server ──▶ registry ──▶ forward ───┼──▶ Backend
//!                          │       │           (resolve)    (reqwest)   │   blog.internal
//!                          │       ▼                            │        │
//!   rewritten HTML ◀───────┼── rewrite ◀── decompress ◀─────────┘        │
//!                          │  (urls/headers/cookies)                     │
//!                          │                                             │
//!                          │  cross-cutting: config · observability ·    │
//!                          │                 lifecycle                   │
//!                          └────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use portal_proxy::config::{load_config, services_from_env, ProxyConfig};
use portal_proxy::lifecycle::{signals, Shutdown};
use portal_proxy::observability::{logging, metrics};
use portal_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "portal-proxy", version, about = "Path-prefix reverse proxy")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Override the listener bind address (e.g. 0.0.0.0:8080).
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            // No file: defaults plus any SERVICE_* environment definitions.
            let mut config = ProxyConfig::default();
            config.services.extend(services_from_env());
            config
        }
    };
    if let Some(listen) = args.listen {
        config.listener.bind_address = listen;
    }

    logging::init(
        &config.observability.log_level,
        config.observability.log_buffer_enabled,
    );

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        services = config.services.len(),
        "portal-proxy starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(address) => {
                if let Err(error) = metrics::init_metrics(address) {
                    tracing::error!(%error, "failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let receiver = shutdown.subscribe();
    tokio::spawn(signals::listen_for_signals(Arc::clone(&shutdown)));

    let server = HttpServer::new(config)?;
    server.run(listener, receiver).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
