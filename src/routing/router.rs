//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes grouped by virtual host
//! - Resolve (virtual host, path) to an upstream pool name
//! - Return an explicit miss rather than a silent default
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) host lookup via HashMap, exact string comparison
//! - O(n) pattern scan per host in declaration order, first match wins

use std::collections::HashMap;

use crate::config::ProxyConfig;
use crate::routing::matcher::PathPattern;

/// Port for which virtual host names are used without a suffix.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// One location of a virtual host.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub pattern: PathPattern,
    pub pool: String,
}

/// Maps virtual hosts and request paths to upstream pool names.
#[derive(Debug, Default)]
pub struct RouteTable {
    hosts: HashMap<String, Vec<RouteEntry>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile the `servers` section of the configuration.
    pub fn from_config(config: &ProxyConfig) -> Self {
        let mut table = Self::new();
        for (host, locations) in &config.servers {
            let virtual_host = virtual_host_key(host, config.listen);
            for location in locations {
                table.insert(&virtual_host, &location.path, &location.proxy_pass);
            }
        }

        tracing::debug!(
            hosts = table.hosts.len(),
            routes = table.len(),
            "Route table compiled"
        );
        table
    }

    /// Append a route for `virtual_host`; it is tried after existing ones.
    pub fn insert(&mut self, virtual_host: &str, pattern: &str, pool: &str) {
        self.hosts
            .entry(virtual_host.to_string())
            .or_default()
            .push(RouteEntry {
                pattern: PathPattern::new(pattern),
                pool: pool.to_string(),
            });
    }

    /// Resolve the pool for a request, `None` on a routable miss.
    pub fn resolve(&self, virtual_host: &str, path: &str) -> Option<&str> {
        self.hosts
            .get(virtual_host)?
            .iter()
            .find(|entry| entry.pattern.matches(path))
            .map(|entry| entry.pool.as_str())
    }

    /// Total number of routes across all hosts.
    pub fn len(&self) -> usize {
        self.hosts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Pool names referenced by any route.
    pub fn referenced_pools(&self) -> impl Iterator<Item = &str> {
        self.hosts
            .values()
            .flat_map(|entries| entries.iter().map(|e| e.pool.as_str()))
    }
}

/// The key a client's `Host` header is looked up under.
///
/// Browsers include the port in `Host` for non-default ports, so the
/// configured name gets the listening port appended in that case.
pub fn virtual_host_key(host: &str, listen: u16) -> String {
    if listen == DEFAULT_HTTP_PORT {
        host.to_string()
    } else {
        format!("{}:{}", host, listen)
    }
}
