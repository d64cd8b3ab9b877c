//! Retry with exponential backoff for transient adapter failures

use hardtack_common::config::RetrySection;
use hardtack_core::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl From<&RetrySection> for RetryPolicy {
    fn from(section: &RetrySection) -> Self {
        Self {
            max_attempts: section.max_attempts.max(1),
            initial_backoff: Duration::from_millis(section.initial_backoff_ms),
            max_backoff: Duration::from_millis(section.max_backoff_ms),
            multiplier: section.multiplier,
            jitter: section.jitter,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(32) as i32);
        let millis = (self.initial_backoff.as_millis() as f64 * factor)
            .min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    /// Delay before retry number `attempt`, with up to 50% random jitter added
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let spread = (base.as_millis() as u64 / 2).max(1);
        let extra = rand::thread_rng().gen_range(0..=spread);
        (base + Duration::from_millis(extra)).min(self.max_backoff.max(base))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.next_delay(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hardtack_core::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.next_delay(0), Duration::from_millis(100));
        assert_eq!(policy.next_delay(1), Duration::from_millis(200));
        assert_eq!(policy.next_delay(2), Duration::from_millis(350));
        assert_eq!(policy.next_delay(40), Duration::from_millis(350));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let delay = policy.next_delay(0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = fast(3)
            .run("read", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::Unreachable {
                        device_id: "d1".into(),
                    })
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_fatal_errors() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<()> = fast(5)
            .run("write", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::InvalidState("no".into()))
            })
            .await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<()> = fast(2)
            .run("read", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Unreachable {
                    device_id: "d1".into(),
                })
            })
            .await;
        assert!(matches!(result, Err(Error::Unreachable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_from_config_section() {
        let policy = RetryPolicy::from(&RetrySection::default());
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(200));
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}
