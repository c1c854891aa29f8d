//! Proxy engine.
//!
//! One engine per worker. Each client request runs as a small state machine:
//!
//! ```text
//! ROUTING → SELECTING → ACQUIRING → FORWARDING → RELAYING
//!               ▲           │            │
//!               └───────────┴── failure ─┘   (while attempts remain, else FAILED)
//! ```
//!
//! The client is checked before every transition; once it is gone the
//! request is dropped together with any upstream session it holds. A failure
//! while reading the upstream response body ends the request with a 500
//! because the upstream has already processed it.

use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response};

use crate::http::request::{is_keep_alive, read_body, virtual_host, BodyError, OutboundRequest};
use crate::http::response;
use crate::load_balancer::ServerDescriptor;
use crate::net::connection::{ClientHandle, ConnectionId};
use crate::observability::metrics;
use crate::proxy::context::WorkerContext;
use crate::proxy::ProxyState;
use crate::resilience::{RetryBudget, MAX_ATTEMPTS};
use crate::upstream::{Transport, Upstream, UpstreamError};

/// The client connection closed before a response could be delivered.
#[derive(Debug, thiserror::Error)]
#[error("client {0} disconnected")]
pub struct ClientDisconnected(pub ConnectionId);

/// Final result of dispatching one request.
#[derive(Debug)]
pub enum Outcome {
    /// The upstream answered; its response goes back to the client.
    Relayed(Response<Bytes>),
    /// No route, no pool, or an empty pool.
    NotFound,
    /// Every attempt failed.
    UpstreamError,
    /// The client went away mid-flight.
    Abandoned,
}

enum Stage<C> {
    Selecting,
    Acquiring(Arc<ServerDescriptor>),
    Forwarding { conn: C, reused: bool },
    Relaying { response: Response<Bytes>, conn: C },
    NotFound,
    Failed,
}

impl<C> Stage<C> {
    fn name(&self) -> &'static str {
        match self {
            Stage::Selecting => "selecting",
            Stage::Acquiring(_) => "acquiring",
            Stage::Forwarding { .. } => "forwarding",
            Stage::Relaying { .. } => "relaying",
            Stage::NotFound => "not_found",
            Stage::Failed => "failed",
        }
    }
}

/// Per-request state carried across attempts.
struct InFlightRequest {
    pool: String,
    outbound: OutboundRequest,
    /// Held until an upstream has answered; hyper reports the write and the
    /// response head as a single result.
    body: Option<Bytes>,
    budget: RetryBudget,
}

impl InFlightRequest {
    fn new(pool: &str, request: Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let outbound = OutboundRequest::normalize(&Request::from_parts(parts, ()), body.len());

        Self {
            pool: pool.to_string(),
            outbound,
            body: Some(body),
            budget: RetryBudget::new(MAX_ATTEMPTS),
        }
    }

    fn attempt(&self) -> Request<Full<Bytes>> {
        self.outbound.build(self.body.clone().unwrap_or_default())
    }

    fn on_connect_result<C: Upstream>(
        &mut self,
        server: &ServerDescriptor,
        result: Result<C, UpstreamError>,
    ) -> Stage<C> {
        match result {
            Ok(conn) => Stage::Forwarding { conn, reused: false },
            Err(error) => self.retry_or_fail(server, None, &error),
        }
    }

    fn on_write_result<C: Upstream>(
        &mut self,
        conn: C,
        result: Result<Response<Bytes>, UpstreamError>,
    ) -> Stage<C> {
        match result {
            Ok(response) => {
                self.body = None;
                Stage::Relaying { response, conn }
            }
            Err(error) => {
                // A session that failed mid-exchange is never reused.
                let id = conn.id();
                let server = conn.server().clone();
                drop(conn);
                match &error {
                    // The upstream already answered, so replaying could run the request twice.
                    UpstreamError::Body(_) => self.fail_after_response(&server, id, &error),
                    _ => self.retry_or_fail(&server, Some(id), &error),
                }
            }
        }
    }

    fn fail_after_response<C>(
        &mut self,
        server: &ServerDescriptor,
        connection: ConnectionId,
        error: &UpstreamError,
    ) -> Stage<C> {
        metrics::record_upstream_failure(&self.pool, error.stage());
        self.body = None;
        tracing::error!(
            pool = %self.pool,
            server = %server,
            connection_id = %connection,
            stage = error.stage(),
            error = %error,
            "Upstream response failed, not retrying"
        );
        Stage::Failed
    }

    fn retry_or_fail<C>(
        &mut self,
        server: &ServerDescriptor,
        connection: Option<ConnectionId>,
        error: &UpstreamError,
    ) -> Stage<C> {
        metrics::record_upstream_failure(&self.pool, error.stage());
        let retry = self.budget.record_failure();

        match connection {
            Some(id) => tracing::warn!(
                pool = %self.pool,
                server = %server,
                connection_id = %id,
                stage = error.stage(),
                attempt = self.budget.failures(),
                error = %error,
                "Upstream attempt failed"
            ),
            None => tracing::warn!(
                pool = %self.pool,
                server = %server,
                stage = error.stage(),
                attempt = self.budget.failures(),
                error = %error,
                "Upstream attempt failed"
            ),
        }

        if retry {
            Stage::Selecting
        } else {
            tracing::error!(
                pool = %self.pool,
                attempts = self.budget.failures(),
                "Upstream attempts exhausted"
            );
            Stage::Failed
        }
    }
}

/// Forwards client requests for one worker.
pub struct ProxyEngine<T: Transport> {
    state: Arc<ProxyState>,
    transport: T,
    worker: WorkerContext<T::Conn>,
}

impl<T: Transport> ProxyEngine<T> {
    pub fn new(state: Arc<ProxyState>, transport: T, worker_id: usize) -> Self {
        Self {
            state,
            transport,
            worker: WorkerContext::new(worker_id),
        }
    }

    pub fn worker(&self) -> &WorkerContext<T::Conn> {
        &self.worker
    }

    /// Serve one request as received from the client connection.
    pub async fn handle(
        &self,
        client: &ClientHandle,
        request: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, ClientDisconnected> {
        let started = Instant::now();
        let (parts, body) = request.into_parts();

        let result = match read_body(body, self.state.limits.max_request_body).await {
            Ok(body) => self.respond(client, Request::from_parts(parts, body)).await,
            Err(BodyError::TooLarge(limit)) => {
                tracing::warn!(client = %client.id(), peer = ?client.peer(), limit, "Request body too large");
                Ok(response::payload_too_large())
            }
            Err(e) => {
                tracing::debug!(client = %client.id(), error = %e, "Failed to read request body");
                if client.is_closed() {
                    Err(ClientDisconnected(client.id()))
                } else {
                    Ok(response::bad_request())
                }
            }
        };

        if let Ok(response) = &result {
            metrics::record_request(response.status().as_u16(), started);
        }
        result
    }

    /// Dispatch an aggregated request and build the client response.
    pub async fn respond(
        &self,
        client: &ClientHandle,
        request: Request<Bytes>,
    ) -> Result<Response<Full<Bytes>>, ClientDisconnected> {
        let keep_alive = is_keep_alive(request.version(), request.headers());

        match self.dispatch(client, request).await {
            Outcome::Relayed(upstream) => Ok(response::relay(upstream, keep_alive)),
            Outcome::NotFound => Ok(response::not_found(keep_alive)),
            Outcome::UpstreamError => Ok(response::upstream_error(keep_alive)),
            Outcome::Abandoned => Err(ClientDisconnected(client.id())),
        }
    }

    /// Run the forwarding state machine for one request.
    pub async fn dispatch(&self, client: &ClientHandle, request: Request<Bytes>) -> Outcome {
        let host = virtual_host(&request).unwrap_or_default();
        let path = request.uri().path();

        let Some(pool) = self.state.routes.resolve(host, path) else {
            tracing::debug!(client = %client.id(), host = %host, path = %path, "No route matched");
            return Outcome::NotFound;
        };
        tracing::debug!(
            client = %client.id(),
            worker = self.worker.id(),
            method = %request.method(),
            path = %path,
            pool = %pool,
            "Routing request"
        );

        let mut flight = InFlightRequest::new(pool, request);
        let mut stage = Stage::Selecting;

        loop {
            if client.is_closed() {
                tracing::debug!(
                    client = %client.id(),
                    pool = %flight.pool,
                    stage = stage.name(),
                    "Client disconnected, abandoning request"
                );
                return Outcome::Abandoned;
            }

            stage = match stage {
                Stage::Selecting => self.select(&flight.pool),
                Stage::Acquiring(server) => match self.worker.acquire(&flight.pool, &server) {
                    Some(conn) => Stage::Forwarding { conn, reused: true },
                    None => {
                        let result = self.transport.connect(&server).await;
                        flight.on_connect_result(&server, result)
                    }
                },
                Stage::Forwarding { mut conn, reused } => {
                    metrics::record_upstream_connection(reused);
                    tracing::trace!(
                        connection_id = %conn.id(),
                        server = %conn.server(),
                        reused,
                        "Forwarding request"
                    );
                    let result = conn.send(flight.attempt()).await;
                    flight.on_write_result(conn, result)
                }
                Stage::Relaying { response: reply, conn } => {
                    if response::upstream_reusable(&reply) && !self.worker.release(&flight.pool, conn) {
                        tracing::trace!(pool = %flight.pool, "Upstream connection not cached");
                    }
                    return Outcome::Relayed(reply);
                }
                Stage::NotFound => return Outcome::NotFound,
                Stage::Failed => return Outcome::UpstreamError,
            };
        }
    }

    fn select(&self, pool: &str) -> Stage<T::Conn> {
        let Some(balancer) = self.state.balancers.get(pool) else {
            tracing::debug!(pool = %pool, "No such upstream pool");
            return Stage::NotFound;
        };
        match balancer.next_server() {
            Some(server) => Stage::Acquiring(server),
            None => {
                tracing::debug!(pool = %pool, "Upstream pool has no servers");
                Stage::NotFound
            }
        }
    }
}
