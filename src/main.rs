//! edge-proxy: an HTTP/1.1 reverse proxy.
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────────┐
//!                     │                       EDGE PROXY                          │
//!  Client Request     │  ┌──────────┐   ┌──────────┐   ┌─────────────────────┐   │
//!  ───────────────────┼─▶│ listener │──▶│  worker  │──▶│ http server (hyper) │   │
//!                     │  └──────────┘   └──────────┘   └─────────┬───────────┘   │
//!                     │                                          ▼               │
//!                     │  ┌──────────┐   ┌──────────────┐   ┌──────────────┐      │
//!                     │  │ routing  │◀──│ proxy engine │──▶│load_balancer │      │
//!                     │  └──────────┘   └──────┬───────┘   └──────────────┘      │
//!                     │                        ▼                                 │
//!  Client Response    │               ┌─────────────────┐                        │
//!  ◀──────────────────┼───────────────│ connection cache│◀──── upstream ─────────┼──── Backend
//!                     │               │   + transport   │                        │
//!                     │               └─────────────────┘                        │
//!                     └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use edge_proxy::config::load_config;
use edge_proxy::lifecycle::{self, StartupError};
use edge_proxy::observability::logging;

/// Exit status for an unusable configuration.
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "edge-proxy")]
#[command(about = "HTTP/1.1 reverse proxy with per-worker connection reuse", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("edge-proxy: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if cli.check {
        println!("edge-proxy: configuration {} is valid", cli.config.display());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::init(&config.observability.log_level) {
        eprintln!("edge-proxy: failed to initialize logging: {}", e);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        listen = %config.listen_address(),
        worker_threads = config.worker_threads.resolve(),
        "edge-proxy starting"
    );

    match lifecycle::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(StartupError::Config(e)) => {
            tracing::error!(error = %e, "Invalid configuration");
            ExitCode::from(EXIT_CONFIG)
        }
        Err(e) => {
            tracing::error!(error = %e, "Proxy failed");
            ExitCode::FAILURE
        }
    }
}
