//! Timeout and retry combinators for async operations

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Returned when an operation did not finish in time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedOut {
    pub after: Duration,
}

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timed out after {:?}", self.after)
    }
}

impl std::error::Error for TimedOut {}

/// Race `operation` against a timer. The operation is dropped on timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    operation: impl Future<Output = T>,
) -> Result<T, TimedOut> {
    tokio::time::timeout(duration, operation)
        .await
        .map_err(|_| TimedOut { after: duration })
}

/// Attempt count and exponential backoff schedule
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the zero-based `attempt` failed: initial, 2x, 4x, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `operation` until it succeeds or the policy's attempts are used up
///
/// The closure receives the zero-based attempt number. The last error is
/// returned unchanged.
pub async fn with_retry<T, E, Fut, Op>(policy: RetryPolicy, mut operation: Op) -> Result<T, E>
where
    E: fmt::Display,
    Fut: Future<Output = Result<T, E>>,
    Op: FnMut(u32) -> Fut,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 >= attempts => return Err(err),
            Err(err) => {
                let delay = policy.backoff(attempt);
                log::warn!(
                    "Attempt {}/{} failed: {}, retrying in {:?}",
                    attempt + 1,
                    attempts,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
