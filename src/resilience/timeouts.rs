//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream connection establishment with a deadline
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timed-out connect is a connect failure like any other (retryable)

use std::future::Future;
use std::time::Duration;

/// Marker error for an elapsed deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct Elapsed(pub Duration);

/// Run `future` with a deadline. A zero duration disables the deadline.
pub async fn with_deadline<F, T>(deadline: Duration, future: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    if deadline.is_zero() {
        return Ok(future.await);
    }
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| Elapsed(deadline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let result = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_deadline_elapses() {
        let result = with_deadline(
            Duration::from_millis(50),
            tokio::time::sleep(Duration::from_secs(10)),
        )
        .await;
        assert_eq!(result, Err(Elapsed(Duration::from_millis(50))));
    }

    #[tokio::test]
    async fn test_zero_disables_deadline() {
        let result = with_deadline(Duration::ZERO, async { "done" }).await;
        assert_eq!(result, Ok("done"));
    }
}
