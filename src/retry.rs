//! Poll-until-ready with bounded attempts and a backoff policy.
//!
//! The health probe is the only caller that retries: document uploads are
//! attempted once per run and a missing artifact is what triggers a retry on
//! the next invocation. Keeping the loop here means the probe itself is just
//! a readiness predicate.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Fixed(Duration),
    /// `initial * 2^(n-1)` after the n-th failed attempt, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after `failed_attempts` consecutive failures (1-based).
    pub fn delay(&self, failed_attempts: u32) -> Duration {
        match *self {
            Backoff::Fixed(d) => d,
            Backoff::Exponential { initial, max } => {
                let exp = failed_attempts.saturating_sub(1).min(31);
                initial.saturating_mul(1u32 << exp).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Always ≥ 1 in practice; 0 is
    /// treated as 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(interval),
        }
    }
}

/// Successful poll: the value and how many attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready<T> {
    pub value: T,
    pub attempts: u32,
}

/// Every attempt failed.
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempts: {last_error}")]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Call `op` until it returns `Ok`, sleeping per `policy` between attempts.
///
/// `op` receives the 1-based attempt number. No sleep happens after the
/// final attempt.
pub async fn poll_until<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<Ready<T>, Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                debug!("ready after {} attempt(s)", attempt);
                return Ok(Ready {
                    value,
                    attempts: attempt,
                });
            }
            Err(e) if attempt >= max => {
                warn!("attempt {}/{} failed: {}; giving up", attempt, max, e);
                return Err(Exhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = policy.backoff.delay(attempt);
                warn!(
                    "attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, max, e, delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn fixed_backoff_is_constant() {
        let b = Backoff::Fixed(Duration::from_secs(10));
        assert_eq!(b.delay(1), Duration::from_secs(10));
        assert_eq!(b.delay(7), Duration::from_secs(10));
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let b = Backoff::Exponential {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(3),
        };
        assert_eq!(b.delay(1), Duration::from_millis(500));
        assert_eq!(b.delay(2), Duration::from_secs(1));
        assert_eq!(b.delay(3), Duration::from_secs(2));
        assert_eq!(b.delay(4), Duration::from_secs(3));
        assert_eq!(b.delay(60), Duration::from_secs(3));
    }

    #[test]
    fn succeeds_on_third_attempt() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::fixed(5, Duration::ZERO);
        let result = tokio_test::block_on(poll_until(&policy, |attempt| {
            calls.set(calls.get() + 1);
            async move {
                if attempt < 3 {
                    Err(format!("not yet ({attempt})"))
                } else {
                    Ok("up")
                }
            }
        }));
        let ready = result.expect("should become ready");
        assert_eq!(ready.value, "up");
        assert_eq!(ready.attempts, 3);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::fixed(4, Duration::ZERO);
        let result: Result<Ready<()>, _> = tokio_test::block_on(poll_until(&policy, |attempt| {
            calls.set(calls.get() + 1);
            async move { Err(format!("down #{attempt}")) }
        }));
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 4);
        assert_eq!(err.last_error, "down #4");
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy::fixed(0, Duration::ZERO);
        let result = tokio_test::block_on(poll_until(&policy, |_| async { Ok::<_, String>(1) }));
        assert_eq!(result.unwrap().attempts, 1);
    }
}
