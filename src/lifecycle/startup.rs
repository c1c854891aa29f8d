//! Startup orchestration.
//!
//! # Responsibilities
//! - Report configuration warnings
//! - Initialize metrics, bind the listener, build the server
//! - Run until a signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last, once everything behind it is ready

use std::net::SocketAddr;

use crate::config::validation::collect_warnings;
use crate::config::{ConfigError, ProxyConfig};
use crate::http::ProxyServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// Fatal error while starting or running the proxy.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid listen address `{0}`")]
    Address(String),
    #[error("metrics endpoint: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Bind and build everything the proxy needs, without running it.
pub async fn prepare(config: &ProxyConfig) -> Result<(ProxyServer, Listener), StartupError> {
    for warning in collect_warnings(config) {
        tracing::warn!("{}", warning);
    }

    let server = ProxyServer::new(config)?;

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let address = config.listen_address();
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| StartupError::Address(address.clone()))?;
    let max_connections = config.worker_connections.saturating_mul(server.workers());
    let listener = Listener::bind(addr, max_connections).await?;

    Ok((server, listener))
}

/// Run the proxy until SIGINT or SIGTERM.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    let (server, listener) = prepare(&config).await?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        let signal = signals::wait_for_signal().await;
        tracing::info!(signal, "Shutdown requested");
        trigger.trigger();
    });

    server.run(listener, shutdown.sender()).await?;
    Ok(())
}
