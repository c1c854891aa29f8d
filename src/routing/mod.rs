//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header, URI path)
//!     → router.rs (virtual host lookup)
//!     → matcher.rs (evaluate path patterns in order)
//!     → Return: pool name or miss
//!
//! Route Compilation (at startup):
//!     servers section of the config
//!     → virtual host keys (port suffix for non-80 listeners)
//!     → compile path patterns
//!     → Freeze as immutable RouteTable
//! ```

pub mod matcher;
pub mod router;

pub use matcher::PathPattern;
pub use router::{virtual_host_key, RouteEntry, RouteTable};
