//! Request forwarding core.
//!
//! # Data Flow
//! ```text
//! Aggregated client request
//!     → engine.rs ROUTING    (RouteTable: Host + path → pool)
//!     → engine.rs SELECTING  (LoadBalancerRegistry: pool → server)
//!     → engine.rs ACQUIRING  (cache.rs hit, or Transport::connect)
//!     → engine.rs FORWARDING (Upstream::send)
//!     → relayed response, retry from SELECTING, or synthesized 404 / 500
//! ```
//!
//! # Design Decisions
//! - `ProxyState` is built once and shared read-only by all workers
//! - Each worker owns one engine, and with it one connection cache
//! - Retries are a bounded state machine; the client is checked at every transition

pub mod cache;
pub mod context;
pub mod engine;

pub use cache::ConnectionCache;
pub use context::WorkerContext;
pub use engine::{Outcome, ProxyEngine};

use crate::config::{ConfigError, LimitsConfig, ProxyConfig, ValidationError};
use crate::load_balancer::{LoadBalancerRegistry, UpstreamPool};
use crate::routing::RouteTable;

/// Immutable routing and balancing state.
#[derive(Debug)]
pub struct ProxyState {
    pub routes: RouteTable,
    pub balancers: LoadBalancerRegistry,
    pub limits: LimitsConfig,
}

impl ProxyState {
    pub fn new(routes: RouteTable, balancers: LoadBalancerRegistry, limits: LimitsConfig) -> Self {
        Self {
            routes,
            balancers,
            limits,
        }
    }

    /// Build routes and pools from a validated configuration.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let pools = config
            .upstreams
            .iter()
            .map(|(name, upstream)| {
                UpstreamPool::from_config(name, upstream).map_err(|source| {
                    ValidationError::InvalidUpstreamAddress {
                        upstream: name.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::Validation(vec![e]))?;

        let routes = RouteTable::from_config(config);
        let balancers = LoadBalancerRegistry::new(pools);

        for pool in routes.referenced_pools() {
            if balancers.get(pool).is_none() {
                tracing::debug!(pool = %pool, "Route targets an undefined pool");
            }
        }

        tracing::info!(
            routes = routes.len(),
            pools = ?balancers.pool_names().collect::<Vec<_>>(),
            "Proxy state built"
        );

        Ok(Self::new(routes, balancers, config.limits.clone()))
    }
}
