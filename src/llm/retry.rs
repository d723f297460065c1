//! Bounded-attempt retry with exponential backoff
//!
//! Wraps any fallible async operation against the completion endpoint.
//! Transient failures (network, rate limit, 5xx) are retried with an
//! exponentially growing delay; auth and bad-request failures propagate
//! immediately. Every attempt performs a fresh remote call.

use super::LlmError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry configuration. The defaults match the upstream contract:
/// 3 attempts, 2s-30s exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(2),
            cap: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the retry following failed attempt `attempt` (1-based).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = Duration::from_secs(2u64.saturating_pow(attempt));
        let delay = exp.clamp(self.base, self.cap);
        if self.jitter {
            // Up to 10% extra to spread concurrent retries
            let extra = rand::thread_rng().gen_range(0.0..0.1);
            delay.mul_f64(1.0 + extra)
        } else {
            delay
        }
    }

    /// Run `op` until it succeeds, fails non-retryably, or attempts are
    /// exhausted. On exhaustion the last error is propagated.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        debug_assert!(self.max_attempts >= 1);
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.kind.is_retryable() => {
                    if attempt < self.max_attempts {
                        let delay = self.backoff_delay(attempt);
                        tracing::debug!(
                            attempt,
                            max_attempts = self.max_attempts,
                            delay_ms = %delay.as_millis(),
                            error = %e.message,
                            "retrying transient completion failure"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.expect("exhausted retries without recording an error"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = no_jitter()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(LlmError::server_error("upstream 503"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_error_propagates_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), LlmError> = no_jitter()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LlmError::auth("bad key")) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Auth);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_request_propagates_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), LlmError> = no_jitter()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LlmError::invalid_request("bad payload")) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind, LlmErrorKind::InvalidRequest);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), LlmError> = no_jitter()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(LlmError::network(format!("attempt {n} failed"))) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Network);
        assert_eq!(err.message, "attempt 3 failed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = no_jitter();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(8));
        // 2^6 = 64s exceeds the cap
        assert_eq!(policy.backoff_delay(6), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.backoff_delay(1);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2200));
        }
    }
}
