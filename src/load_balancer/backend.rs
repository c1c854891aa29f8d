//! Backend server descriptor.
//!
//! # Responsibilities
//! - Identify a single upstream endpoint (address, port)
//! - Carry the per-worker keep-alive budget of its pool
//! - Provide structural equality for connection cache lookups

use std::fmt;

/// Error returned when an upstream address cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address `{0}` is missing a `:port` suffix")]
    MissingPort(String),
    #[error("address `{0}` has an empty host")]
    EmptyHost(String),
    #[error("address `{0}` has an invalid port")]
    InvalidPort(String),
}

/// A single backend server.
///
/// Immutable once built. Two descriptors are equal when address, port and
/// keep-alive budget are all equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerDescriptor {
    /// Host name or IP literal of the backend.
    pub address: String,
    /// TCP port of the backend.
    pub port: u16,
    /// Maximum idle connections to this server kept by each worker.
    pub keepalive: usize,
}

impl ServerDescriptor {
    pub fn new(address: impl Into<String>, port: u16, keepalive: usize) -> Self {
        Self {
            address: address.into(),
            port,
            keepalive,
        }
    }

    /// Parse a `host:port` string. The split happens on the last colon so
    /// bracketed IPv6 literals such as `[::1]:8080` keep their host part.
    pub fn parse(host: &str, keepalive: usize) -> Result<Self, AddressError> {
        let (address, port) = host
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(host.to_string()))?;

        if address.is_empty() {
            return Err(AddressError::EmptyHost(host.to_string()));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(host.to_string()))?;
        if port == 0 {
            return Err(AddressError::InvalidPort(host.to_string()));
        }

        let address = address.trim_start_matches('[').trim_end_matches(']');
        Ok(Self::new(address, port, keepalive))
    }
}

impl fmt::Display for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_and_port() {
        let server = ServerDescriptor::parse("10.0.0.1:8080", 16).unwrap();
        assert_eq!(server.address, "10.0.0.1");
        assert_eq!(server.port, 8080);
        assert_eq!(server.keepalive, 16);
        assert_eq!(server.to_string(), "10.0.0.1:8080");
    }

    #[test]
    fn parse_ipv6_literal() {
        let server = ServerDescriptor::parse("[::1]:9000", 0).unwrap();
        assert_eq!(server.address, "::1");
        assert_eq!(server.to_string(), "[::1]:9000");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(matches!(
            ServerDescriptor::parse("backend", 1),
            Err(AddressError::MissingPort(_))
        ));
        assert!(matches!(
            ServerDescriptor::parse(":80", 1),
            Err(AddressError::EmptyHost(_))
        ));
        assert!(matches!(
            ServerDescriptor::parse("backend:http", 1),
            Err(AddressError::InvalidPort(_))
        ));
        assert!(matches!(
            ServerDescriptor::parse("backend:0", 1),
            Err(AddressError::InvalidPort(_))
        ));
    }

    #[test]
    fn equality_is_structural() {
        let a = ServerDescriptor::new("127.0.0.1", 80, 4);
        let b = ServerDescriptor::new("127.0.0.1", 80, 4);
        let c = ServerDescriptor::new("127.0.0.1", 80, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
