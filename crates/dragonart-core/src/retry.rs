//! Retry with exponential backoff and jitter, generic over any fallible
//! async operation.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Backoff schedule for retryable failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (1 = never retry).
    pub max_attempts: u32,
    /// Delay after the first failure; doubles for each later failure
    /// (milliseconds).
    pub base_delay_ms: u64,
    /// Upper bound of the uniform random jitter added to each delay
    /// (milliseconds).
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2_000,
            max_jitter_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that runs the operation exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_jitter_ms: 0,
        }
    }

    /// Delay without jitter after `failed_attempt` (1-based) failures.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(32);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << exponent))
    }

    fn jittered(&self, failed_attempt: u32) -> Duration {
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.max_jitter_ms)
        };
        self.backoff(failed_attempt) + Duration::from_millis(jitter)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
///
/// `on_retry(failed_attempt, delay)` is called before each backoff sleep.
/// The last error is returned unchanged once attempts run out.
pub async fn retry_with_backoff<T, E, F, Fut, P, N>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut on_retry: N,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    N: FnMut(u32, Duration),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && is_retryable(&err) => {
                let delay = policy.jittered(attempt);
                on_retry(attempt, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn default_policy_matches_schedule() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 5);
        assert_eq!(p.backoff(1), Duration::from_secs(2));
        assert_eq!(p.backoff(2), Duration::from_secs(4));
        assert_eq!(p.backoff(4), Duration::from_secs(16));
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let p = RetryPolicy::default();
        for _ in 0..50 {
            let d = p.jittered(1);
            assert!(d >= Duration::from_secs(2));
            assert!(d <= Duration::from_secs(3));
        }
    }

    #[test]
    fn backoff_saturates() {
        let p = RetryPolicy {
            max_attempts: 100,
            base_delay_ms: u64::MAX / 2,
            max_jitter_ms: 0,
        };
        assert_eq!(p.backoff(90), Duration::from_millis(u64::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut notified = Vec::new();
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 100,
            max_jitter_ms: 0,
        };

        let c = calls.clone();
        let result: Result<u32, &str> = retry_with_backoff(
            &policy,
            |_| true,
            |attempt, delay| notified.push((attempt, delay)),
            move || {
                let c = c.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("busy")
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            notified,
            vec![
                (1, Duration::from_millis(100)),
                (2, Duration::from_millis(200))
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_non_retryable_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), &str> = retry_with_backoff(
            &RetryPolicy::default(),
            |e: &&str| *e == "busy",
            |_, _| {},
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err("forbidden") }
            },
        )
        .await;
        assert_eq!(result, Err("forbidden"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let mut retries = 0;
        let result: Result<(), &str> = retry_with_backoff(
            &RetryPolicy::default(),
            |_| true,
            |_, _| retries += 1,
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err("busy") }
            },
        )
        .await;
        assert_eq!(result, Err("busy"));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(retries, 4);
    }
}
