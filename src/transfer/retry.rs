//! Bounded retry around whole transfer attempts
//!
//! Only write conflicts are retried. Each retry runs a brand-new attempt:
//! new coordinator, new session, new transaction context.
//!
//! Delay before retry `n` (0-based): `backoff * 2^n`, capped at
//! `max_backoff`. With jitter the delay is drawn from `[d/2, d]`.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use super::error::TransferError;

/// Hard ceiling for `max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryConfigError {
    #[error("max_retries {0} exceeds limit {MAX_RETRIES_LIMIT}")]
    TooManyRetries(u32),

    #[error("max_backoff {max:?} is smaller than backoff {base:?}")]
    BackoffRange { base: Duration, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(RetryConfigError::TooManyRetries(self.max_retries));
        }
        if self.max_backoff < self.backoff {
            return Err(RetryConfigError::BackoffRange {
                base: self.backoff,
                max: self.max_backoff,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Result<Self, RetryConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Never retries: a conflict is reported as exhausted after one attempt
    pub fn no_retry() -> Self {
        Self {
            config: RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            },
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before retry `attempt` (0 = before the second attempt)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let capped = self
            .config
            .backoff
            .saturating_mul(factor)
            .min(self.config.max_backoff);

        if !self.config.jitter || capped.is_zero() {
            return capped;
        }
        // Down-jitter: multiply by random factor in [0.5, 1.0]
        capped.mul_f64(0.5 + rand::random::<f64>() * 0.5)
    }

    /// Run `attempt_fn` until it succeeds, fails with a non-retryable error,
    /// or has conflicted `max_retries + 1` times.
    pub async fn run<T, F, Fut>(&self, mut attempt_fn: F) -> Result<T, TransferError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransferError>>,
    {
        let mut attempt = 0u32;
        loop {
            match attempt_fn(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(attempt, "Transfer succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    if attempt >= self.config.max_retries {
                        warn!(attempts = attempt + 1, error = %e, "Retries exhausted");
                        return Err(TransferError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: Box::new(e),
                        });
                    }
                    let delay = self.delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Write conflict, retrying transfer"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
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

    fn fixed(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_retries,
            backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
        })
        .unwrap()
    }

    fn conflict() -> TransferError {
        TransferError::WriteConflict("busy".into())
    }

    #[test]
    fn test_validate_rejects_unbounded_retries() {
        let config = RetryConfig {
            max_retries: MAX_RETRIES_LIMIT + 1,
            ..RetryConfig::default()
        };
        assert_eq!(
            RetryPolicy::new(config).unwrap_err(),
            RetryConfigError::TooManyRetries(MAX_RETRIES_LIMIT + 1)
        );

        let config = RetryConfig {
            backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(10),
            ..RetryConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RetryConfigError::BackoffRange { .. })
        ));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 5,
            backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            jitter: false,
        })
        .unwrap();
        assert_eq!(policy.delay(0), Duration::from_millis(10));
        assert_eq!(policy.delay(1), Duration::from_millis(20));
        assert_eq!(policy.delay(2), Duration::from_millis(40));
        assert_eq!(policy.delay(3), Duration::from_millis(50));
        assert_eq!(policy.delay(40), Duration::from_millis(50));
    }

    #[test]
    fn test_jitter_stays_in_lower_half() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 1,
            backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(100),
            jitter: true,
        })
        .unwrap();
        for _ in 0..100 {
            let d = policy.delay(0);
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(100), "{:?}", d);
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let mut calls = 0;
        let result = fixed(3)
            .run(|_| {
                calls += 1;
                async { Ok::<_, TransferError>(7) }
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_conflicts_exhaust_after_max_retries() {
        let mut calls = 0;
        let result: Result<(), _> = fixed(3)
            .run(|_| {
                calls += 1;
                async { Err(conflict()) }
            })
            .await;
        assert_eq!(calls, 4);
        match result {
            Err(TransferError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert_eq!(*last, conflict());
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_reports_exhausted() {
        let result: Result<(), _> = RetryPolicy::no_retry().run(|_| async { Err(conflict()) }).await;
        assert!(matches!(
            result,
            Err(TransferError::RetriesExhausted { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_non_retryable_returned_immediately() {
        let mut calls = 0;
        let result: Result<(), _> = fixed(3)
            .run(|_| {
                calls += 1;
                async { Err(TransferError::Timeout("slow".into())) }
            })
            .await;
        assert_eq!(calls, 1);
        assert_eq!(result, Err(TransferError::Timeout("slow".into())));
    }

    #[tokio::test]
    async fn test_succeeds_after_conflicts() {
        let result = fixed(3)
            .run(|attempt| async move {
                if attempt < 2 { Err(conflict()) } else { Ok(attempt) }
            })
            .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_attempts() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 2,
            backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            jitter: false,
        })
        .unwrap();

        let started = tokio::time::Instant::now();
        let _: Result<(), _> = policy.run(|_| async { Err(conflict()) }).await;
        // 100ms + 200ms
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
