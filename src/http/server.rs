//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the shared proxy state from configuration
//! - Start the worker pool, one proxy engine per worker
//! - Run the accept loop and hand sockets to workers
//! - Serve each client connection with hyper's HTTP/1 server
//!
//! # Design Decisions
//! - Requests on one connection are answered in order (HTTP/1, no pipelining fan-out)
//! - `keepalive_timeout` bounds how long a client may take to send a request head
//! - A request abandoned by the engine fails the hyper service, so nothing is written

use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::config::{ConfigError, ProxyConfig};
use crate::net::connection::ClientHandle;
use crate::net::listener::{Listener, ListenerError};
use crate::net::worker::{Accepted, WorkerPool};
use crate::proxy::{ProxyEngine, ProxyState};
use crate::upstream::{HttpTransport, Transport, TransportSettings};

/// Settings for client-side HTTP/1 connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionSettings {
    pub keepalive_timeout: Option<Duration>,
}

/// Serve one client connection until it closes.
pub async fn serve_connection<T>(
    engine: Rc<ProxyEngine<T>>,
    stream: TcpStream,
    peer: SocketAddr,
    settings: ConnectionSettings,
) where
    T: Transport + 'static,
{
    let client = ClientHandle::new(peer);
    tracing::debug!(client = %client.id(), peer = %peer, "Client connected");

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(client = %client.id(), error = %e, "Failed to set TCP_NODELAY");
    }
    let io = TokioIo::new(client.track(stream));

    let service = {
        let client = client.clone();
        service_fn(move |request| {
            let engine = engine.clone();
            let client = client.clone();
            async move { engine.handle(&client, request).await }
        })
    };

    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new()).keep_alive(true);
    if let Some(timeout) = settings.keepalive_timeout {
        builder.header_read_timeout(timeout);
    }

    if let Err(e) = builder.serve_connection(io, service).await {
        tracing::debug!(client = %client.id(), error = %e, "Client connection ended with error");
    }

    client.mark_closed();
    tracing::debug!(client = %client.id(), "Client disconnected");
}

/// The reverse proxy: shared state plus the settings each worker needs.
#[derive(Debug)]
pub struct ProxyServer {
    state: Arc<ProxyState>,
    transport: TransportSettings,
    connection: ConnectionSettings,
    workers: usize,
}

impl ProxyServer {
    /// Build the server from a validated configuration.
    pub fn new(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let state = Arc::new(ProxyState::from_config(config)?);

        Ok(Self {
            state,
            transport: TransportSettings {
                connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
                max_response_body: config.limits.max_response_body,
            },
            connection: ConnectionSettings {
                keepalive_timeout: config.keepalive_timeout(),
            },
            workers: config.worker_threads.resolve(),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Accept connections until shutdown is signalled, then stop the workers.
    pub async fn run(
        self,
        listener: Listener,
        shutdown: broadcast::Sender<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(address = %addr, workers = self.workers, "Proxy server starting");

        let state = self.state.clone();
        let transport = self.transport.clone();
        let settings = self.connection;

        let mut pool = WorkerPool::spawn(self.workers, &shutdown, move |worker| {
            let engine = Rc::new(ProxyEngine::new(
                state.clone(),
                HttpTransport::new(transport.clone()),
                worker,
            ));
            move |accepted: Accepted| {
                let Accepted { stream, peer, permit } = accepted;
                let engine = engine.clone();
                tokio::task::spawn_local(async move {
                    let _permit = permit;
                    match TcpStream::from_std(stream) {
                        Ok(stream) => serve_connection(engine, stream, peer, settings).await,
                        Err(e) => tracing::warn!(peer = %peer, error = %e, "Failed to register client socket"),
                    }
                });
            }
        })
        .map_err(ListenerError::Accept)?;

        let mut shutdown_rx = shutdown.subscribe();
        let result = loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let stream = match stream.into_std() {
                            Ok(stream) => stream,
                            Err(e) => {
                                tracing::warn!(peer = %peer, error = %e, "Failed to detach client socket");
                                continue;
                            }
                        };
                        if pool.dispatch(Accepted { stream, peer, permit }).is_err() {
                            tracing::error!("No worker left to take connections");
                            break Ok(());
                        }
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                    }
                    Err(e) => break Err(e),
                },
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break Ok(());
                }
            }
        };

        // Wakes workers still waiting if the loop ended for another reason.
        let _ = shutdown.send(());
        if let Err(e) = tokio::task::spawn_blocking(move || pool.join()).await {
            tracing::error!(error = %e, "Failed to join worker pool");
        }

        tracing::info!("Proxy server stopped");
        result
    }
}
