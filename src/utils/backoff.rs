//! Bounded retry with jittered exponential backoff.
//!
//! Used only at collaborator boundaries: a transient oracle or RPC failure
//! is retried a bounded number of times, then surfaced. Nothing inside a
//! committed batch is ever retried this way.

use std::future::Future;
use std::time::Duration;

use eyre::Result;
use log::warn;

/// Retry policy: attempt count and base delay for the exponential schedule.
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry, plus jitter
    pub base_delay: Duration,
}

impl Backoff {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before the retry following attempt number `attempt` (1-based):
    /// `base × 2^(attempt-1)` plus up to half of that again as jitter.
    #[allow(clippy::cast_possible_truncation)]
    fn delay_after(&self, attempt: u32) -> Duration {
        let doubled = self.base_delay.saturating_mul(1 << (attempt - 1).min(16));
        let half_ms = (doubled.as_millis() as u64 / 2).max(1);
        doubled + Duration::from_millis(fastrand::u64(0..=half_ms))
    }

    /// Runs `op` until it succeeds or the attempt budget is exhausted,
    /// sleeping between attempts. The final error is returned as-is.
    ///
    /// # Errors
    /// Returns the last error once `max_attempts` attempts have failed.
    pub async fn retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{what}: attempt {attempt}/{} failed ({e}), retrying in {delay:?}",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::bail;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_without_retrying() {
        let calls = AtomicU32::new(0);
        let result = Backoff::new(3, Duration::from_millis(10))
            .retry("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = Backoff::new(3, Duration::from_millis(10))
            .retry("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        bail!("transient");
                    }
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = Backoff::new(4, Duration::from_millis(10))
            .retry("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { bail!("always down") }
            })
            .await;
        assert_eq!(result.err().unwrap().to_string(), "always down");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
