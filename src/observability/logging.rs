//! Structured logging.
//!
//! # Design Decisions
//! - Uses the tracing crate; every event carries structured fields
//! - `RUST_LOG` wins over the configured level when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// Returns an error if a subscriber is already installed, which happens
/// when several proxies run in one test process.
pub fn init(level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("edge_proxy={level},warn")));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
