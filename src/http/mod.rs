//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Client socket (from a worker)
//!     → server.rs (hyper HTTP/1 connection, one service call per request)
//!     → request.rs (keep-alive decision, body aggregation, normalization)
//!     → [proxy engine routes, selects, forwards]
//!     → response.rs (relay rewrite or synthesized 404 / 500)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{is_keep_alive, BodyError, OutboundRequest};
pub use server::{serve_connection, ConnectionSettings, ProxyServer};
