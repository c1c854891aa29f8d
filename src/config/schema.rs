//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Prefix turning an `upstreams` key into the pool name used by `proxy_pass`.
pub const UPSTREAM_POOL_PREFIX: &str = "http://";

/// Pool name for an `upstreams` table key.
pub fn pool_name(key: &str) -> String {
    format!("{}{}", UPSTREAM_POOL_PREFIX, key)
}

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listening port.
    pub listen: u16,

    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Number of worker threads.
    pub worker_threads: WorkerThreads,

    /// Maximum concurrent client connections per worker.
    pub worker_connections: usize,

    /// Seconds a keep-alive client may stay silent before the next request head.
    pub keepalive_timeout: u64,

    /// Virtual host → ordered locations.
    pub servers: BTreeMap<String, Vec<LocationConfig>>,

    /// Upstream pools keyed by name (without the `http://` prefix).
    pub upstreams: BTreeMap<String, UpstreamConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Message size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: 8080,
            bind_address: "0.0.0.0".to_string(),
            worker_threads: WorkerThreads::Auto,
            worker_connections: 1024,
            keepalive_timeout: 60,
            servers: BTreeMap::new(),
            upstreams: BTreeMap::new(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// `bind_address:listen` as a string suitable for parsing.
    pub fn listen_address(&self) -> String {
        if self.bind_address.contains(':') {
            format!("[{}]:{}", self.bind_address, self.listen)
        } else {
            format!("{}:{}", self.bind_address, self.listen)
        }
    }

    /// Client keep-alive idle timeout, `None` when disabled.
    pub fn keepalive_timeout(&self) -> Option<Duration> {
        (self.keepalive_timeout > 0).then(|| Duration::from_secs(self.keepalive_timeout))
    }
}

/// Worker thread count: a fixed number or one per available CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawWorkerThreads")]
pub enum WorkerThreads {
    #[default]
    Auto,
    Fixed(usize),
}

impl WorkerThreads {
    /// Resolve to a concrete thread count (at least 1).
    pub fn resolve(&self) -> usize {
        match self {
            WorkerThreads::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            WorkerThreads::Fixed(n) => (*n).max(1),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWorkerThreads {
    Count(usize),
    Named(String),
}

impl TryFrom<RawWorkerThreads> for WorkerThreads {
    type Error = String;

    fn try_from(raw: RawWorkerThreads) -> Result<Self, Self::Error> {
        match raw {
            RawWorkerThreads::Count(n) => Ok(WorkerThreads::Fixed(n)),
            RawWorkerThreads::Named(name) if name.eq_ignore_ascii_case("auto") => {
                Ok(WorkerThreads::Auto)
            }
            RawWorkerThreads::Named(name) => name
                .trim()
                .parse()
                .map(WorkerThreads::Fixed)
                .map_err(|_| format!("worker_threads must be \"auto\" or a number, got `{}`", name)),
        }
    }
}

/// A path pattern of a virtual host and the pool it is proxied to.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    /// Ant-style path pattern (`?`, `*`, `**`).
    pub path: String,

    /// Target pool, e.g. "http://backend".
    pub proxy_pass: String,
}

/// An upstream pool.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Idle keep-alive connections preserved per server in each worker's cache.
    pub keepalive: usize,

    /// Backend addresses ("host:port").
    pub servers: Vec<String>,
}

/// Timeout configuration for upstream operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_secs: 5 }
    }
}

/// Limits on aggregated message bodies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum client request body in bytes.
    pub max_request_body: usize,

    /// Maximum upstream response body in bytes.
    pub max_response_body: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_body: 512 * 1024,
            max_response_body: 8 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config: ProxyConfig = toml::from_str(
            r#"
            listen = 80
            worker_threads = 4
            worker_connections = 256
            keepalive_timeout = 0

            [servers]
            "example.com" = [
                { path = "/api/**", proxy_pass = "http://api" },
                { path = "/**", proxy_pass = "http://web" },
            ]

            [upstreams.api]
            keepalive = 16
            servers = ["10.0.0.1:9000", "10.0.0.2:9000"]

            [upstreams.web]
            servers = ["10.0.0.3:80"]

            [timeouts]
            connect_secs = 2

            [observability]
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen, 80);
        assert_eq!(config.worker_threads, WorkerThreads::Fixed(4));
        assert_eq!(config.worker_connections, 256);
        assert_eq!(config.keepalive_timeout(), None);
        assert_eq!(config.servers["example.com"].len(), 2);
        assert_eq!(config.servers["example.com"][0].proxy_pass, "http://api");
        assert_eq!(config.upstreams["api"].keepalive, 16);
        assert_eq!(config.upstreams["web"].keepalive, 0);
        assert_eq!(config.timeouts.connect_secs, 2);
        assert_eq!(config.limits.max_request_body, 512 * 1024);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.listen_address(), "0.0.0.0:80");
    }

    #[test]
    fn test_worker_threads_forms() {
        #[derive(Deserialize)]
        struct Holder {
            worker_threads: WorkerThreads,
        }

        let parse = |s: &str| toml::from_str::<Holder>(s).map(|h| h.worker_threads);

        assert_eq!(parse("worker_threads = \"auto\"").unwrap(), WorkerThreads::Auto);
        assert_eq!(parse("worker_threads = \"AUTO\"").unwrap(), WorkerThreads::Auto);
        assert_eq!(parse("worker_threads = \"3\"").unwrap(), WorkerThreads::Fixed(3));
        assert_eq!(parse("worker_threads = 2").unwrap(), WorkerThreads::Fixed(2));
        assert!(parse("worker_threads = \"many\"").is_err());

        assert!(WorkerThreads::Auto.resolve() >= 1);
        assert_eq!(WorkerThreads::Fixed(0).resolve(), 1);
    }

    #[test]
    fn test_pool_name() {
        assert_eq!(pool_name("backend"), "http://backend");
    }
}
