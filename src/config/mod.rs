//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, warnings)
//!     → ProxyConfig (validated, immutable)
//!     → compiled once into RouteTable + LoadBalancerRegistry
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; there is no runtime reload
//! - All fields have defaults to allow minimal configs
//! - Any configuration error is fatal and exits the process with status 2

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    pool_name, LimitsConfig, LocationConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig,
    UpstreamConfig, WorkerThreads, UPSTREAM_POOL_PREFIX,
};
pub use validation::{ValidationError, ValidationWarning};
