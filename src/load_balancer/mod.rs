//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → pool name identified
//!     → pool.rs (registry lookup by pool name)
//!     → round_robin.rs (advance shared counter, pick server)
//!     → backend.rs (ServerDescriptor handed to the proxy engine)
//! ```
//!
//! # Design Decisions
//! - Registry is built once at startup and is read-only afterwards
//! - Selection has no memory of failures; the engine's retry loop simply asks again
//! - The per-pool counter is the only state shared between workers (atomic)

use std::sync::Arc;

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::{AddressError, ServerDescriptor};
pub use pool::{LoadBalancerRegistry, UpstreamPool};
pub use round_robin::RoundRobin;

/// Server selection strategy for one upstream pool.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Select the next server, or `None` when the pool is empty.
    fn next_server(&self) -> Option<Arc<ServerDescriptor>>;

    /// All servers of the pool, in configured order.
    fn servers(&self) -> &[Arc<ServerDescriptor>];
}
