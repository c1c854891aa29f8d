//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → worker.rs (round-robin hand-off to a worker thread)
//!     → connection.rs (client identity, closed detection)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - A connection never migrates once a worker has taken it

pub mod connection;
pub mod listener;
pub mod worker;

pub use connection::{ClientHandle, ConnectionId, TrackedIo};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use worker::{Accepted, WorkerPool};
