//! Reusable retry policy for model and transport calls.
//!
//! Both the record extractor and the bank-name detector need the same
//! behaviour: a bounded number of attempts, a delay between them, and a
//! predicate deciding which errors are worth retrying. Pulling that into
//! one type keeps the call sites free of inline sleep loops and guarantees
//! the two paths never drift apart.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// How the delay grows across attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// `step * attempt`: 5 s, 10 s, 15 s, … Matches rate-limit windows
    /// that reset on fixed intervals.
    Linear { step: Duration },
    /// `base * 2^(attempt-1)`: 500 ms, 1 s, 2 s, …
    Exponential { base: Duration },
}

/// A bounded retry policy with a pluggable backoff curve.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always ≥ 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Linear policy: `max_attempts` tries with `step_secs * attempt`
    /// seconds of delay before each retry.
    pub fn linear(max_attempts: u32, step_secs: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Linear {
                step: Duration::from_secs(step_secs),
            },
        }
    }

    /// Delay before retry number `attempt` (1-based: the delay slept after
    /// attempt 1 failed is `delay_before(2)` with `attempt - 1` applied by
    /// the caller convention below).
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Linear { step } => step * failed_attempt,
            Backoff::Exponential { base } => base * 2u32.saturating_pow(failed_attempt - 1),
        }
    }

    /// Run `op` until it succeeds, a non-retryable error occurs, or the
    /// attempt budget is exhausted. The final error is returned either way.
    ///
    /// `retryable` inspects the error after each failed attempt; returning
    /// false short-circuits the loop.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "attempt {}/{} failed ({}); retrying in {:?}",
                        attempt, self.max_attempts, e, delay
                    );
                    sleep(delay).await;
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
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn linear_delays_grow_by_step() {
        let p = RetryPolicy::linear(5, 5);
        assert_eq!(p.delay_for(1), Duration::from_secs(5));
        assert_eq!(p.delay_for(2), Duration::from_secs(10));
        assert_eq!(p.delay_for(4), Duration::from_secs(20));
    }

    #[test]
    fn exponential_delays_double() {
        let p = RetryPolicy {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(500),
            },
        };
        assert_eq!(p.delay_for(1), Duration::from_millis(500));
        assert_eq!(p.delay_for(2), Duration::from_millis(1000));
        assert_eq!(p.delay_for(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let p = RetryPolicy::linear(5, 0);
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = p
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(42) }
                },
                |_| true,
            )
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_retryable_errors_up_to_budget() {
        let p = RetryPolicy::linear(3, 0);
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = p
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("rate limit".to_string()) }
                },
                |_| true,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits() {
        let p = RetryPolicy::linear(5, 0);
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = p
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("bad api key".to_string()) }
                },
                |e| e.contains("rate limit"),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let p = RetryPolicy::linear(5, 0);
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = p
            .run(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err("429".to_string())
                        } else {
                            Ok(7)
                        }
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
