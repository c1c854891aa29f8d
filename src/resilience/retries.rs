//! Retry budget.
//!
//! # Responsibilities
//! - Bound the number of forwarding attempts per request
//! - Count connect and write failures against the same budget
//!
//! # Design Decisions
//! - Fixed budget of 3 attempts per request, not per server
//! - No backoff: the next attempt re-selects immediately
//! - Failures below the budget are invisible to the client

/// Forwarding attempts permitted per inbound request.
pub const MAX_ATTEMPTS: u32 = 3;

/// Per-request attempt counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u32,
    used: u32,
}

impl RetryBudget {
    pub fn new(attempts: u32) -> Self {
        Self {
            remaining: attempts.max(1),
            used: 0,
        }
    }

    /// Record one failed attempt. Returns true if another attempt may be made.
    pub fn record_failure(&mut self) -> bool {
        self.used += 1;
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining > 0
    }

    /// Attempts still available, including the current one.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Failed attempts recorded so far.
    pub fn failures(&self) -> u32 {
        self.used
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_allows_three_attempts() {
        let mut budget = RetryBudget::default();
        assert_eq!(budget.remaining(), 3);
        assert!(budget.record_failure());
        assert!(budget.record_failure());
        assert!(!budget.record_failure());
        assert_eq!(budget.failures(), 3);
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_budget_never_below_one_attempt() {
        let mut budget = RetryBudget::new(0);
        assert_eq!(budget.remaining(), 1);
        assert!(!budget.record_failure());
        assert!(!budget.record_failure());
    }
}
