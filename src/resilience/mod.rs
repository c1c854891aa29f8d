//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (enforce connect deadline)
//!     → On connect/write failure: retries.rs (consume budget, re-select or give up)
//! ```

pub mod retries;
pub mod timeouts;

pub use retries::{RetryBudget, MAX_ATTEMPTS};
pub use timeouts::{with_deadline, Elapsed};
