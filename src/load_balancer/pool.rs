//! Upstream pools and the load balancer registry.
//!
//! # Responsibilities
//! - Build one pool per configured upstream
//! - Own one load balancer per pool
//! - Resolve a pool name to its load balancer at request time

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::{pool_name, UpstreamConfig};
use crate::load_balancer::{
    backend::{AddressError, ServerDescriptor},
    round_robin::RoundRobin,
    LoadBalancer,
};

/// A named, ordered set of backend servers.
#[derive(Debug, Clone)]
pub struct UpstreamPool {
    pub name: String,
    pub servers: Vec<Arc<ServerDescriptor>>,
}

impl UpstreamPool {
    /// Build a pool from its configuration entry.
    pub fn from_config(key: &str, config: &UpstreamConfig) -> Result<Self, AddressError> {
        let servers = config
            .servers
            .iter()
            .map(|host| ServerDescriptor::parse(host, config.keepalive).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: pool_name(key),
            servers,
        })
    }
}

/// Fixed mapping of pool name to load balancer.
///
/// Built once at startup and never modified, so lookups need no locking.
#[derive(Debug, Default)]
pub struct LoadBalancerRegistry {
    balancers: HashMap<String, Box<dyn LoadBalancer>>,
}

impl LoadBalancerRegistry {
    /// Create a registry with a round-robin balancer per pool.
    pub fn new(pools: Vec<UpstreamPool>) -> Self {
        let balancers = pools
            .into_iter()
            .map(|pool| {
                if pool.servers.is_empty() {
                    tracing::debug!(pool = %pool.name, "Upstream pool has no servers");
                }
                let lb: Box<dyn LoadBalancer> = Box::new(RoundRobin::new(pool.servers));
                (pool.name, lb)
            })
            .collect();

        Self { balancers }
    }

    /// Build the registry from the `upstreams` configuration table.
    pub fn from_config(
        upstreams: &BTreeMap<String, UpstreamConfig>,
    ) -> Result<Self, AddressError> {
        let pools = upstreams
            .iter()
            .map(|(key, config)| UpstreamPool::from_config(key, config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(pools))
    }

    /// Load balancer for the given pool, if one is configured.
    pub fn get(&self, pool: &str) -> Option<&dyn LoadBalancer> {
        self.balancers.get(pool).map(|lb| lb.as_ref())
    }

    /// Names of all configured pools.
    pub fn pool_names(&self) -> impl Iterator<Item = &str> {
        self.balancers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.balancers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balancers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(servers: &[&str], keepalive: usize) -> UpstreamConfig {
        UpstreamConfig {
            keepalive,
            servers: servers.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_registry_from_config() {
        let mut upstreams = BTreeMap::new();
        upstreams.insert("web".to_string(), upstream(&["127.0.0.1:8001", "127.0.0.1:8002"], 8));
        upstreams.insert("empty".to_string(), upstream(&[], 8));

        let registry = LoadBalancerRegistry::from_config(&upstreams).unwrap();
        assert_eq!(registry.len(), 2);

        let web = registry.get("http://web").unwrap();
        assert_eq!(web.servers().len(), 2);
        assert_eq!(web.next_server().unwrap().port, 8001);
        assert_eq!(web.next_server().unwrap().port, 8002);
        assert_eq!(web.servers()[0].keepalive, 8);

        let empty = registry.get("http://empty").unwrap();
        assert!(empty.next_server().is_none());

        assert!(registry.get("web").is_none());
        assert!(registry.get("http://missing").is_none());
    }

    #[test]
    fn test_registry_rejects_bad_address() {
        let mut upstreams = BTreeMap::new();
        upstreams.insert("web".to_string(), upstream(&["localhost"], 1));
        assert!(LoadBalancerRegistry::from_config(&upstreams).is_err());
    }
}
