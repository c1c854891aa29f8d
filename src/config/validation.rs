//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, thread and connection counts)
//! - Check upstream addresses are well formed
//! - Report dangling references as warnings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - A `proxy_pass` naming an unknown pool is not an error: it answers 404 at runtime

use std::net::SocketAddr;

use crate::config::schema::{pool_name, ProxyConfig, WorkerThreads};
use crate::load_balancer::{AddressError, ServerDescriptor};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listen port must be non-zero")]
    ZeroListenPort,
    #[error("invalid bind address `{0}`")]
    InvalidBindAddress(String),
    #[error("worker_threads must be at least 1")]
    ZeroWorkerThreads,
    #[error("worker_connections must be at least 1")]
    ZeroWorkerConnections,
    #[error("server `{host}` location #{index} has an empty {field}")]
    EmptyLocationField {
        host: String,
        index: usize,
        field: &'static str,
    },
    #[error("upstream `{upstream}`: {source}")]
    InvalidUpstreamAddress {
        upstream: String,
        #[source]
        source: AddressError,
    },
    #[error("invalid metrics address `{0}`")]
    InvalidMetricsAddress(String),
}

/// A configuration smell that does not prevent startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// A location proxies to a pool that is not defined.
    UnknownPool { host: String, proxy_pass: String },
    /// An upstream with no servers; requests routed to it get 404.
    EmptyUpstream { upstream: String },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::UnknownPool { host, proxy_pass } => write!(
                f,
                "server `{}` proxies to undefined upstream `{}`; matching requests will get 404",
                host, proxy_pass
            ),
            ValidationWarning::EmptyUpstream { upstream } => write!(
                f,
                "upstream `{}` has no servers; requests routed to it will get 404",
                upstream
            ),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen == 0 {
        errors.push(ValidationError::ZeroListenPort);
    } else if config.listen_address().parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.bind_address.clone()));
    }

    if config.worker_threads == WorkerThreads::Fixed(0) {
        errors.push(ValidationError::ZeroWorkerThreads);
    }
    if config.worker_connections == 0 {
        errors.push(ValidationError::ZeroWorkerConnections);
    }

    for (host, locations) in &config.servers {
        for (index, location) in locations.iter().enumerate() {
            if location.path.is_empty() {
                errors.push(ValidationError::EmptyLocationField {
                    host: host.clone(),
                    index,
                    field: "path",
                });
            }
            if location.proxy_pass.is_empty() {
                errors.push(ValidationError::EmptyLocationField {
                    host: host.clone(),
                    index,
                    field: "proxy_pass",
                });
            }
        }
    }

    for (name, upstream) in &config.upstreams {
        for server in &upstream.servers {
            if let Err(source) = ServerDescriptor::parse(server, upstream.keepalive) {
                errors.push(ValidationError::InvalidUpstreamAddress {
                    upstream: name.clone(),
                    source,
                });
            }
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Collect non-fatal problems worth logging at startup.
pub fn collect_warnings(config: &ProxyConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for (host, locations) in &config.servers {
        for location in locations {
            let known = config
                .upstreams
                .keys()
                .any(|key| pool_name(key) == location.proxy_pass);
            if !known {
                warnings.push(ValidationWarning::UnknownPool {
                    host: host.clone(),
                    proxy_pass: location.proxy_pass.clone(),
                });
            }
        }
    }

    for (name, upstream) in &config.upstreams {
        if upstream.servers.is_empty() {
            warnings.push(ValidationWarning::EmptyUpstream {
                upstream: name.clone(),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LocationConfig, UpstreamConfig};

    fn valid_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.servers.insert(
            "example.com".into(),
            vec![LocationConfig {
                path: "/**".into(),
                proxy_pass: "http://web".into(),
            }],
        );
        config.upstreams.insert(
            "web".into(),
            UpstreamConfig {
                keepalive: 4,
                servers: vec!["127.0.0.1:9000".into()],
            },
        );
        config
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate_config(&config).is_ok());
        assert!(collect_warnings(&config).is_empty());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid_config();
        config.listen = 0;
        config.worker_threads = WorkerThreads::Fixed(0);
        config.worker_connections = 0;
        config.upstreams.get_mut("web").unwrap().servers.push("nohost".into());
        config.servers.get_mut("example.com").unwrap().push(LocationConfig {
            path: String::new(),
            proxy_pass: String::new(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ValidationError::ZeroListenPort));
        assert!(errors.contains(&ValidationError::ZeroWorkerThreads));
        assert!(errors.contains(&ValidationError::ZeroWorkerConnections));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidUpstreamAddress { upstream, .. } if upstream == "web")));
    }

    #[test]
    fn test_bad_bind_and_metrics_address() {
        let mut config = valid_config();
        config.bind_address = "not-an-ip".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidBindAddress("not-an-ip".into()),
                ValidationError::InvalidMetricsAddress("nowhere".into()),
            ]
        );
    }

    #[test]
    fn test_warnings() {
        let mut config = valid_config();
        config.servers.get_mut("example.com").unwrap().push(LocationConfig {
            path: "/old/**".into(),
            proxy_pass: "http://legacy".into(),
        });
        config.upstreams.insert("idle".into(), UpstreamConfig::default());

        let warnings = collect_warnings(&config);
        assert_eq!(
            warnings,
            vec![
                ValidationWarning::UnknownPool {
                    host: "example.com".into(),
                    proxy_pass: "http://legacy".into(),
                },
                ValidationWarning::EmptyUpstream {
                    upstream: "idle".into(),
                },
            ]
        );
    }
}
