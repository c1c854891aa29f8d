//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let config = parse_config("listen = 9000").unwrap();
        assert_eq!(config.listen, 9000);
        assert!(config.servers.is_empty());
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("listen = \"eighty\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_message() {
        let err = parse_config("listen = 0\nworker_connections = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 2));
        assert_eq!(
            err.to_string(),
            "validation failed: listen port must be non-zero, worker_connections must be at least 1"
        );
    }

    #[test]
    fn test_sample_config() {
        let config = load_config(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/edge-proxy.toml")))
            .unwrap();
        assert_eq!(config.listen, 8080);
        assert_eq!(config.servers["example.com"].len(), 3);
        assert_eq!(config.upstreams["api"].servers.len(), 4);
        assert_eq!(config.upstreams["web"].keepalive, 8);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/edge-proxy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
