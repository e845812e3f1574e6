//! Retry policy for the remote clients
//!
//! Transient failures (network errors, 5xx responses) are retried with
//! exponential backoff; permanent classifications (auth, quota, malformed
//! requests) fail immediately. Retries happen inside the worker running the
//! call, so the state machine only sees them as elapsed time within the
//! Transcribing or Editing stage.

use crate::config::RetryConfig;
use std::time::Duration;

/// Retry policy with exponential backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    base_backoff: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            base_backoff,
            multiplier,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.backoff_ms),
            config.backoff_multiplier,
        )
    }

    /// Backoff before the given retry attempt (1-indexed)
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        self.base_backoff.mul_f64(factor)
    }

    /// Run `op`, retrying transient failures up to `max_retries` times.
    ///
    /// Blocking (uses thread::sleep); call from a blocking worker, never
    /// from the event loop.
    pub fn run<T, E, F>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Transient + std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        "{} failed (attempt {}/{}), retrying in {:.1}s: {}",
                        what,
                        attempt,
                        self.max_retries,
                        delay.as_secs_f32(),
                        e
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Errors that can say whether retrying makes sense
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for crate::error::TranscribeError {
    fn is_transient(&self) -> bool {
        self.is_transient()
    }
}

impl Transient for crate::error::EditError {
    fn is_transient(&self) -> bool {
        self.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranscribeError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1), 2.0)
    }

    #[test]
    fn test_success_first_try() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, TranscribeError> = fast_policy().run("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transient_retried_to_exhaustion() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, TranscribeError> = fast_policy().run("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TranscribeError::Network("refused".into()))
        });
        assert!(result.is_err());
        // 1 initial try + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_permanent_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, TranscribeError> = fast_policy().run("op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TranscribeError::Auth { status: 401 })
        });
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transient_then_success() {
        let calls = AtomicU32::new(0);
        let result: Result<i32, TranscribeError> = fast_policy().run("op", || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TranscribeError::Server {
                    status: 503,
                    body: "busy".into(),
                })
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_growth() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), 3.0);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(300));
        assert_eq!(policy.backoff(3), Duration::from_millis(900));
    }
}
