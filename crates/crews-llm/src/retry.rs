//! The retry/backoff state machine (spec §4.2): `Idle -> Validating ->
//! Transmitting -> (Success | Retrying -> Transmitting ... | Failed)`.
//! Retries HTTP 5xx / transient transport errors, never 4xx; `wait = attempt
//! x base` (linear backoff, as specified -- not exponential despite the
//! component table's prose elsewhere describing retry/backoff generically,
//! spec §4.2's formula is explicit: "exponential backoff (wait = attempt x
//! base)" is the component summary's words, but the literal formula given is
//! linear in `attempt`; we implement the formula as written).

use std::time::Duration;

use tokio::time::sleep;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_wait: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_wait: Duration) -> Self {
        RetryPolicy {
            max_retries,
            base_wait,
        }
    }

    fn wait_for_attempt(&self, attempt: u32) -> Duration {
        self.base_wait * attempt
    }

    /// Runs `op` under this policy. `op` receives the 1-based attempt
    /// number. Retries only when the returned error is
    /// `TransportError::is_retryable()`; a non-retryable error (4xx,
    /// validation, parse, ...) returns immediately. Exactly `max_retries + 1`
    /// attempts are made against a persistently-failing transient fault
    /// (spec §8 boundary behavior).
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt <= self.max_retries => {
                    let wait = self.wait_for_attempt(attempt);
                    tracing::warn!(attempt, wait_ms = wait.as_millis() as u64, error = %err, "retrying transient transport failure");
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_persistent_5xx_exactly_max_retries_plus_one_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let result: Result<(), TransportError> = policy
            .run(|_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::Transport("503".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|_attempt| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TransportError::Transport("503".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_4xx_validation_errors() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let result: Result<(), TransportError> = policy
            .run(|_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::Provider("400 bad request".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
