//! Bounded retry around a single logical operation
//!
//! Retry eligibility comes only from [`ErrorKind::is_transient`]; the delay
//! between attempts is a pluggable [`Backoff`].

use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;

use crate::config::ClientConfig;
use crate::error::{ApiError, SyncError};

/// Delay before retry number `retry` (1-based).
pub trait Backoff: Send + Sync {
    fn delay(&self, retry: u32) -> Duration;
}

/// Same pause before every retry.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Backoff for FixedDelay {
    fn delay(&self, _retry: u32) -> Duration {
        self.0
    }
}

/// `base * 2^(retry-1)`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff for ExponentialBackoff {
    fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Retry settings shared by every operation of one run.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Arc<dyn Backoff>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: impl Backoff + 'static) -> Self {
        Self {
            max_retries,
            backoff: Arc::new(backoff),
        }
    }

    /// Fixed delay policy from `max_retries` / `retry_delay_ms`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.max_retries, FixedDelay(config.retry_delay()))
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, FixedDelay(Duration::ZERO))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `attempt_fn` until it succeeds, fails fatally, or retries run out.
    ///
    /// `attempt_fn` receives the 1-based attempt number. Operations that are
    /// not idempotent get exactly one attempt whatever the error kind.
    pub fn execute<T>(
        &self,
        label: &str,
        idempotent: bool,
        pb: &ProgressBar,
        mut attempt_fn: impl FnMut(u32) -> Result<T, ApiError>,
    ) -> Result<T, SyncError> {
        let max_retries = if idempotent { self.max_retries } else { 0 };
        let mut attempt = 1u32;
        loop {
            let err = match attempt_fn(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if err.kind.is_fatal() || !idempotent {
                log::error!("{label}: failed permanently: {err}");
                return Err(SyncError::Api {
                    context: label.to_string(),
                    source: err,
                });
            }

            if attempt > max_retries {
                log::error!("{label}: giving up after {attempt} attempts: {err}");
                return Err(SyncError::RetriesExhausted {
                    context: label.to_string(),
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.backoff.delay(attempt);
            pb.set_message(format!("{label}: retry {attempt}/{max_retries}..."));
            log::warn!(
                "{label}: attempt {attempt}/{} failed: {err}, retrying in {delay:?}",
                max_retries + 1
            );
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, FixedDelay(Duration::ZERO))
    }

    fn err(kind: ErrorKind) -> ApiError {
        ApiError::new(kind, None, "test")
    }

    #[test]
    fn exponential_backoff_doubles() {
        let b = ExponentialBackoff {
            base: Duration::from_secs(2),
            max: Duration::from_secs(60),
        };
        assert_eq!(b.delay(1), Duration::from_secs(2));
        assert_eq!(b.delay(2), Duration::from_secs(4));
        assert_eq!(b.delay(3), Duration::from_secs(8));
        assert_eq!(b.delay(10), Duration::from_secs(60));
    }

    #[test]
    fn fixed_delay_is_constant() {
        let b = FixedDelay(Duration::from_millis(250));
        assert_eq!(b.delay(1), b.delay(7));
    }

    #[test]
    fn transient_exhausts_after_max_plus_one() {
        let mut calls = 0;
        let result: Result<(), _> =
            policy(3).execute("products page 1", true, &ProgressBar::hidden(), |_| {
                calls += 1;
                Err(err(ErrorKind::ServerError))
            });
        assert_eq!(calls, 4);
        match result {
            Err(SyncError::RetriesExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last.kind, ErrorKind::ServerError);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn fatal_short_circuits() {
        let mut calls = 0;
        let result: Result<(), _> = policy(3).execute("x", true, &ProgressBar::hidden(), |_| {
            calls += 1;
            Err(err(ErrorKind::AuthenticationFailed))
        });
        assert_eq!(calls, 1);
        assert_eq!(
            result.unwrap_err().api_kind(),
            Some(ErrorKind::AuthenticationFailed)
        );
    }

    #[test]
    fn recovers_after_transient() {
        let result = policy(3).execute("x", true, &ProgressBar::hidden(), |attempt| {
            if attempt < 3 {
                Err(err(ErrorKind::NetworkTimeout))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn non_idempotent_never_retried() {
        let mut calls = 0;
        let result: Result<(), _> = policy(3).execute("create", false, &ProgressBar::hidden(), |_| {
            calls += 1;
            Err(err(ErrorKind::ServerError))
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(SyncError::Api { .. })));
    }

    #[test]
    fn zero_retries_single_attempt() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::none().execute("x", true, &ProgressBar::hidden(), |_| {
            calls += 1;
            Err(err(ErrorKind::RateLimited))
        });
        assert_eq!(calls, 1);
        assert!(matches!(
            result,
            Err(SyncError::RetriesExhausted { attempts: 1, .. })
        ));
    }
}
