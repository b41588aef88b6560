//! Bounded retry with linear backoff.

use std::future::Future;
use std::time::Duration;

use threadcast_common::config::WorkerSettings;
use tracing::warn;

use super::clock::Delay;
use super::publisher::PublishError;

/// Retry policy for publish calls.
///
/// After failed attempt `n` the caller sleeps `n * base_delay` before trying
/// again. There is no sleep after the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    pub max_attempts: u32,
    /// Unit of the linear backoff.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// Create a policy. At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Build the policy configured for the worker.
    #[must_use]
    pub fn from_settings(settings: &WorkerSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_secs(settings.base_delay_secs),
        )
    }

    /// Backoff slept after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. Exhaustion is reported as
    /// [`PublishError::Terminal`] carrying the last transient message.
    pub async fn run<T, F, Fut>(
        &self,
        delay: &dyn Delay,
        label: &str,
        mut op: F,
    ) -> Result<T, PublishError>
    where
        F: FnMut(u32) -> Fut + Send,
        Fut: Future<Output = Result<T, PublishError>> + Send,
    {
        let mut last_message = String::new();

        for attempt in 1..=self.max_attempts {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if attempt < self.max_attempts {
                        let backoff = self.delay_after(attempt);
                        warn!(
                            label,
                            attempt,
                            delay_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "Transient publish failure, backing off"
                        );
                        delay.sleep(backoff).await;
                    }
                    last_message = err.to_string();
                }
                Err(err) => return Err(err),
            }
        }

        Err(PublishError::Terminal(format!(
            "{label} failed after {} attempts: {last_message}",
            self.max_attempts
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::RecordingDelay;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(2))
    }

    #[test]
    fn test_linear_backoff() {
        let policy = policy();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(6));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_success_after_two_transient_failures() {
        let delay = RecordingDelay::new();
        let calls = AtomicU32::new(0);

        let result = policy()
            .run(&delay, "main", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(PublishError::Transient("rate limited".to_string()))
                    } else {
                        Ok("post-1".to_string())
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "post-1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            delay.recorded(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_is_terminal_without_trailing_sleep() {
        let delay = RecordingDelay::new();

        let result: Result<String, _> = policy()
            .run(&delay, "reply1", |_| async {
                Err(PublishError::Transient("timeout".to_string()))
            })
            .await;

        match result {
            Err(PublishError::Terminal(message)) => {
                assert!(message.contains("3 attempts"));
                assert!(message.contains("timeout"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(delay.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_terminal_error_is_not_retried() {
        let delay = RecordingDelay::new();
        let calls = AtomicU32::new(0);

        let result: Result<String, _> = policy()
            .run(&delay, "main", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PublishError::Terminal("bad request".to_string())) }
            })
            .await;

        assert_eq!(result, Err(PublishError::Terminal("bad request".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(delay.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_only_transient_errors_are_retried() {
        let delay = RecordingDelay::new();
        let calls = AtomicU32::new(0);

        let result: Result<String, _> = policy()
            .run(&delay, "main", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PublishError::CredentialMissing("owner1".to_string())) }
            })
            .await;

        assert_eq!(
            result,
            Err(PublishError::CredentialMissing("owner1".to_string()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(delay.recorded().is_empty());
    }
}
