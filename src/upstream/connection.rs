//! Established upstream HTTP/1.1 session.
//!
//! # Responsibilities
//! - Pair a hyper `SendRequest` with the server descriptor it was opened to
//! - Write one request and collect the complete response
//! - Report whether the session is still usable

use std::sync::Arc;

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Bytes;
use hyper::client::conn::http1::SendRequest;
use hyper::{Request, Response};

use crate::load_balancer::ServerDescriptor;
use crate::net::connection::ConnectionId;
use crate::upstream::UpstreamError;

/// One upstream session, owned either by an in-flight request or by a
/// worker's connection cache.
#[allow(async_fn_in_trait)]
pub trait Upstream {
    /// Identifier used in logs.
    fn id(&self) -> ConnectionId;

    /// The server this session is connected to.
    fn server(&self) -> &ServerDescriptor;

    /// False once the transport has been closed by either side.
    fn is_open(&self) -> bool;

    /// Write `request` and wait for the complete response.
    async fn send(&mut self, request: Request<Full<Bytes>>)
        -> Result<Response<Bytes>, UpstreamError>;
}

/// HTTP/1.1 session over TCP driven by hyper's client connection.
#[derive(Debug)]
pub struct UpstreamConnection {
    id: ConnectionId,
    server: Arc<ServerDescriptor>,
    sender: SendRequest<Full<Bytes>>,
    max_response_body: usize,
}

impl UpstreamConnection {
    pub fn new(
        server: Arc<ServerDescriptor>,
        sender: SendRequest<Full<Bytes>>,
        max_response_body: usize,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            server,
            sender,
            max_response_body,
        }
    }
}

impl Upstream for UpstreamConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn server(&self) -> &ServerDescriptor {
        &self.server
    }

    fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn send(
        &mut self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<Bytes>, UpstreamError> {
        // A cached session whose peer went away fails here, before anything is written.
        self.sender
            .ready()
            .await
            .map_err(|e| UpstreamError::Closed(e.into()))?;

        let response = self
            .sender
            .send_request(request)
            .await
            .map_err(|e| UpstreamError::Request(e.into()))?;

        let (parts, body) = response.into_parts();
        let body = Limited::new(body, self.max_response_body)
            .collect()
            .await
            .map_err(UpstreamError::Body)?
            .to_bytes();

        Ok(Response::from_parts(parts, body))
    }
}
