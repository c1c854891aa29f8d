//! Upstream transport subsystem.
//!
//! # Data Flow
//! ```text
//! Selected ServerDescriptor
//!     → connector.rs (TCP connect with deadline, HTTP/1.1 handshake)
//!     → connection.rs (write request, collect response)
//!     → back to the proxy engine: response, a retryable error, or a failed response body
//! ```
//!
//! # Design Decisions
//! - `Transport` and `Upstream` are traits so the engine can be driven by scripted transports
//! - Sessions are created on, and stay on, the calling worker's runtime

pub mod connection;
pub mod connector;

pub use connection::{Upstream, UpstreamConnection};
pub use connector::{HttpTransport, Transport, TransportSettings};

use crate::resilience::Elapsed;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure on the upstream leg of a request.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("connect to {server} failed: {source}")]
    Connect {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("connect to {server} timed out: {source}")]
    ConnectTimeout {
        server: String,
        #[source]
        source: Elapsed,
    },
    #[error("handshake with {server} failed: {source}")]
    Handshake {
        server: String,
        #[source]
        source: hyper::Error,
    },
    #[error("connection closed before the request was written: {0}")]
    Closed(#[source] BoxError),
    #[error("request failed: {0}")]
    Request(#[source] BoxError),
    #[error("response body failed: {0}")]
    Body(#[source] BoxError),
}

impl UpstreamError {
    /// Which leg of the exchange failed, for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            UpstreamError::Connect { .. }
            | UpstreamError::ConnectTimeout { .. }
            | UpstreamError::Handshake { .. } => "connect",
            UpstreamError::Closed(_) | UpstreamError::Request(_) => "write",
            UpstreamError::Body(_) => "response",
        }
    }
}
