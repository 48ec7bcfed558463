//! Retry with linear backoff for provider calls.
//!
//! Rate-limit responses and transient failures are retried up to a fixed
//! attempt cap, waiting `base × attempt` between tries. Authorization
//! failures and every non-provider error are returned immediately.

use grounded_core::{AppError, AppResult, EmbeddingSettings, GenerationSettings};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How often and how patiently to retry a provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub rate_limit_backoff: Duration,
    pub transient_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_backoff: Duration::from_secs(5),
            transient_backoff: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, rate_limit_backoff: Duration, transient_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            rate_limit_backoff,
            transient_backoff,
        }
    }

    /// Policy without waits, for tests and offline providers.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before the next attempt, or `None` when `err` must not be retried.
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn backoff(&self, err: &AppError, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        match err {
            AppError::RateLimited(_) => Some(self.rate_limit_backoff * attempt),
            AppError::ProviderTransient(_) => Some(self.transient_backoff * attempt),
            _ => None,
        }
    }
}

impl From<&EmbeddingSettings> for RetryPolicy {
    fn from(settings: &EmbeddingSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.rate_limit_backoff_ms),
            Duration::from_millis(settings.transient_backoff_ms),
        )
    }
}

impl From<&GenerationSettings> for RetryPolicy {
    fn from(settings: &GenerationSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.rate_limit_backoff_ms),
            Duration::from_millis(settings.transient_backoff_ms),
        )
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy gives up.
///
/// The last error is returned unchanged so callers can still tell a rate
/// limit from an auth failure.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match policy.backoff(&err, attempt) {
            Some(delay) => {
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    label, attempt, policy.max_attempts, err, delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            None => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_grows_with_attempt() {
        let policy = RetryPolicy::default();
        let limited = AppError::RateLimited("429".into());
        let transient = AppError::ProviderTransient("502".into());

        assert_eq!(policy.backoff(&limited, 1), Some(Duration::from_secs(5)));
        assert_eq!(policy.backoff(&limited, 2), Some(Duration::from_secs(10)));
        assert_eq!(policy.backoff(&transient, 1), Some(Duration::from_secs(3)));
        assert_eq!(policy.backoff(&transient, 2), Some(Duration::from_secs(6)));
        assert_eq!(policy.backoff(&transient, 3), None);
    }

    #[test]
    fn test_unauthorized_is_never_retried() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(&AppError::Unauthorized("401".into()), 1), None);
        assert_eq!(policy.backoff(&AppError::Store("x".into()), 1), None);
    }

    #[test]
    fn test_policy_from_settings() {
        let policy = RetryPolicy::from(&EmbeddingSettings::default());
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.rate_limit_backoff, Duration::from_secs(5));
        assert_eq!(policy.transient_backoff, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = with_retry(&RetryPolicy::immediate(3), "embed", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(AppError::ProviderTransient("timeout".into()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: AppResult<()> =
            with_retry(&RetryPolicy::immediate(3), "embed", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::RateLimited("429".into()))
            })
            .await;

        assert!(matches!(result, Err(AppError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_failure_stops_immediately() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: AppResult<()> =
            with_retry(&RetryPolicy::immediate(3), "chat", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Unauthorized("401".into()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
