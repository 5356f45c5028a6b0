//! Bounded exponential backoff for transient remote failures.

use crate::error::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub attempts: u32,
    /// Total wall-clock budget across all attempts and waits.
    pub timeout: Duration,
    pub wait_initial: Duration,
    pub wait_max: Duration,
    /// Upper bound of the uniform random delay added to each wait.
    pub wait_jitter: Duration,
    pub wait_exp_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            timeout: Duration::from_secs(60),
            wait_initial: Duration::from_secs(1),
            wait_max: Duration::from_secs(5),
            wait_jitter: Duration::from_secs(1),
            wait_exp_base: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_wait_initial(mut self, wait: Duration) -> Self {
        self.wait_initial = wait;
        self
    }

    pub fn with_wait_max(mut self, wait: Duration) -> Self {
        self.wait_max = wait;
        self
    }

    pub fn with_wait_jitter(mut self, jitter: Duration) -> Self {
        self.wait_jitter = jitter;
        self
    }

    /// Deterministic part of the wait after the `attempt`-th failure (1-based).
    pub fn base_wait(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let secs = self.wait_initial.as_secs_f64() * self.wait_exp_base.powi(exponent);
        let secs = secs.min(self.wait_max.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }

    fn wait_for(&self, attempt: u32) -> Duration {
        let jitter = if self.wait_jitter.is_zero() {
            Duration::ZERO
        } else {
            self.wait_jitter.mul_f64(rand::thread_rng().gen::<f64>())
        };
        (self.base_wait(attempt) + jitter).min(self.wait_max)
    }

    /// Run `operation` until it succeeds, fails with a non-transient error, or
    /// the attempt/time budget is spent. The last error is returned as-is.
    pub async fn retry<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = what, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt >= self.attempts {
                        warn!(operation = what, attempt, error = %e, "Giving up: attempts exhausted");
                        return Err(e);
                    }

                    let wait = self.wait_for(attempt);
                    if started.elapsed() + wait > self.timeout {
                        warn!(
                            operation = what,
                            attempt,
                            elapsed_secs = started.elapsed().as_secs_f64(),
                            error = %e,
                            "Giving up: retry budget exhausted"
                        );
                        return Err(e);
                    }

                    warn!(
                        operation = what,
                        attempt,
                        max_attempts = self.attempts,
                        delay_secs = wait.as_secs_f64(),
                        error = %e,
                        "Transient failure, retrying"
                    );

                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessingError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transport_error() -> ProcessingError {
        ProcessingError::Transport("connection reset".to_string())
    }

    #[test]
    fn test_base_wait_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_wait(1), Duration::from_secs(1));
        assert_eq!(policy.base_wait(2), Duration::from_secs(2));
        assert_eq!(policy.base_wait(3), Duration::from_secs(4));
        assert_eq!(policy.base_wait(4), Duration::from_secs(5));
        assert_eq!(policy.base_wait(30), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy::default();

        let result = policy
            .retry("open", || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= 2 {
                    Err(transport_error())
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_failure_is_terminal_io_error() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy::default().with_attempts(u32::MAX);
        let started = Instant::now();

        let result: Result<()> = policy
            .retry("open", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transport_error())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_transient());
        assert!(started.elapsed() <= Duration::from_secs(60));
        assert!(calls.load(Ordering::SeqCst) > 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_limit_stops_early() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy::default()
            .with_attempts(3)
            .with_wait_jitter(Duration::ZERO);

        let result: Result<()> = policy
            .retry("open", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transport_error())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy::default();

        let result: Result<()> = policy
            .retry("open", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProcessingError::Authentication("bad credentials".to_string()))
            })
            .await;

        assert!(matches!(result, Err(ProcessingError::Authentication(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
