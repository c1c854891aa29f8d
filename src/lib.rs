//! edge-proxy library.
//!
//! An HTTP/1.1 reverse proxy. Requests are routed by virtual host and
//! Ant-style path pattern to a named upstream pool, balanced round-robin
//! across the pool's servers, and forwarded over upstream connections that
//! each worker keeps alive and reuses.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod proxy;
pub mod routing;
pub mod upstream;

// Traffic management
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
