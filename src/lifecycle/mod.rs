//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config warnings → Metrics → Proxy state → Bind listener → Workers → Accept
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Stop workers → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{prepare, run, StartupError};
