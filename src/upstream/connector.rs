//! Upstream connection establishment.

use std::sync::Arc;
use std::time::Duration;

use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::load_balancer::ServerDescriptor;
use crate::resilience::with_deadline;
use crate::upstream::connection::{Upstream, UpstreamConnection};
use crate::upstream::UpstreamError;

/// Opens new upstream sessions.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Conn: Upstream;

    /// Establish a session to `server`.
    async fn connect(&self, server: &Arc<ServerDescriptor>) -> Result<Self::Conn, UpstreamError>;
}

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub max_response_body: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            max_response_body: 8 * 1024 * 1024,
        }
    }
}

/// Plain TCP + HTTP/1.1 transport.
///
/// The connection driver is spawned on the current runtime, which for a
/// worker is its own single-threaded runtime, so the session never leaves
/// the worker that opened it.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    settings: TransportSettings,
}

impl HttpTransport {
    pub fn new(settings: TransportSettings) -> Self {
        Self { settings }
    }
}

impl Transport for HttpTransport {
    type Conn = UpstreamConnection;

    async fn connect(&self, server: &Arc<ServerDescriptor>) -> Result<UpstreamConnection, UpstreamError> {
        let target = (server.address.as_str(), server.port);
        let stream = with_deadline(self.settings.connect_timeout, TcpStream::connect(target))
            .await
            .map_err(|source| UpstreamError::ConnectTimeout {
                server: server.to_string(),
                source,
            })?
            .map_err(|source| UpstreamError::Connect {
                server: server.to_string(),
                source,
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(server = %server, error = %e, "Failed to set TCP_NODELAY");
        }

        let (sender, connection) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|source| UpstreamError::Handshake {
                server: server.to_string(),
                source,
            })?;

        let upstream = UpstreamConnection::new(
            server.clone(),
            sender,
            self.settings.max_response_body,
        );

        let id = upstream.id();
        let server_label = server.to_string();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(connection_id = %id, server = %server_label, error = %e, "Upstream connection closed with error");
            } else {
                tracing::trace!(connection_id = %id, server = %server_label, "Upstream connection closed");
            }
        });

        tracing::debug!(connection_id = %id, server = %server, "Upstream connection established");
        Ok(upstream)
    }
}
