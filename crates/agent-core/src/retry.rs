//! Bounded retry with linear backoff

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least one is always made)
    pub max_attempts: u32,

    /// Base backoff; the wait after attempt `n` is `n * base_delay`
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay }
    }

    /// Wait applied after the given failed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 { 1 } else { self.max_attempts }
    }
}

/// All attempts failed
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Attempts made
    pub attempts: u32,

    /// Error from the final attempt
    pub last_error: E,
}

/// Run `f` until it succeeds or the policy's attempts are used up.
///
/// `f` receives the 1-based attempt number. `on_failure` is called for
/// every failed attempt, including the last.
pub async fn with_retry<F, Fut, T, E, O>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
    mut on_failure: O,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    O: FnMut(u32, &E),
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match f(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                on_failure(attempt, &e);

                if attempt >= max_attempts {
                    return Err(RetryExhausted { attempts: attempt, last_error: e });
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Retrying after failure"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FAST: RetryPolicy = RetryPolicy::new(3, Duration::from_millis(1));

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let result = with_retry(&FAST, "test", |_| async { Ok::<_, String>(42) }, |_, _| {}).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_success_after_failure() {
        let counter = Arc::new(AtomicU32::new(0));
        let failures = Arc::new(AtomicU32::new(0));

        let result = with_retry(
            &FAST,
            "test",
            |attempt| {
                let c = Arc::clone(&counter);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 { Err("not yet".to_string()) } else { Ok(attempt) }
                }
            },
            |_, _| {
                failures.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(failures.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_reports_last_error() {
        let mut seen = Vec::new();
        let result: Result<(), _> = with_retry(
            &FAST,
            "test",
            |attempt| async move { Err(format!("failure {attempt}")) },
            |attempt, _| seen.push(attempt),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "failure 3");
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let result: Result<(), _> =
            with_retry(&policy, "test", |_| async { Err("no") }, |_, _| {}).await;
        assert_eq!(result.unwrap_err().attempts, 1);
    }
}
