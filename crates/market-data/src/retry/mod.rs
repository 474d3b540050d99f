//! Bounded exponential backoff shared by every network boundary.
//!
//! A [`RetryPolicy`] wraps one fallible async operation. Errors decide for
//! themselves whether another attempt is worthwhile through [`Retryable`];
//! anything else fails on the spot.
//!
//! ```text
//! attempt 1 ──fail──> sleep(base)        ──> attempt 2
//! attempt 2 ──fail──> sleep(base * 2)    ──> attempt 3
//! attempt n ──fail──> RetryError::Exhausted
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use thiserror::Error;

/// Default number of attempts for remote calls.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default jitter as a fraction of the backoff delay.
pub const DEFAULT_JITTER_RATIO: f64 = 0.25;

/// Upper bound on the backoff exponent; keeps `2^n` inside `u32`.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Implemented by errors that can tell a transient failure from a permanent one.
pub trait Retryable {
    /// True for timeouts, 5xx-equivalents and dropped connections.
    fn is_retryable(&self) -> bool;
}

/// Failure of a retried operation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    #[error("Retry exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    /// A non-retryable error ended the loop early.
    #[error("Non-retryable failure on attempt {attempt}: {error}")]
    Aborted { attempt: u32, error: E },
}

impl<E> RetryError<E> {
    /// Number of attempts that were made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Aborted { attempt, .. } => *attempt,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// The last underlying error.
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
            Self::Aborted { error, .. } => error,
        }
    }

    pub fn inner(&self) -> &E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
            Self::Aborted { error, .. } => error,
        }
    }
}

/// Backoff parameters. Cheap to clone; every component gets its own copy
/// at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    jitter_ratio: f64,
}

impl RetryPolicy {
    /// Build a policy. `max_attempts` of 0 behaves like 1 and `jitter_ratio`
    /// is clamped to `[0, 1]`.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }

    /// A single attempt, no sleeping.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            jitter_ratio: 0.0,
        }
    }

    pub fn with_jitter_ratio(mut self, jitter_ratio: f64) -> Self {
        self.jitter_ratio = if jitter_ratio.is_nan() {
            0.0
        } else {
            jitter_ratio.clamp(0.0, 1.0)
        };
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn jitter_ratio(&self) -> f64 {
        self.jitter_ratio
    }

    /// Deterministic part of the delay after the given (1-based) attempt:
    /// `base_delay * 2^(attempt - 1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Backoff plus a random share of it, drawn from `[0, backoff * jitter_ratio]`.
    ///
    /// Because the ratio never exceeds 1, the delay after attempt `n` is never
    /// larger than the plain backoff after attempt `n + 1`.
    fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        if self.jitter_ratio <= 0.0 || backoff.is_zero() {
            return backoff;
        }
        let ceiling = backoff.mul_f64(self.jitter_ratio);
        let jitter = rand::thread_rng().gen_range(Duration::ZERO..=ceiling);
        backoff + jitter
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts.
    ///
    /// `label` identifies the call site in logs.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut state = RetryState::new();

        loop {
            state.attempt += 1;
            match operation().await {
                Ok(value) => {
                    if state.attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, state.attempt);
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    debug!(
                        "{} failed with non-retryable error on attempt {}: {}",
                        label, state.attempt, err
                    );
                    return Err(RetryError::Aborted {
                        attempt: state.attempt,
                        error: err,
                    });
                }
                Err(err) if state.attempt >= self.max_attempts => {
                    warn!(
                        "{} giving up after {} attempts: {}",
                        label, state.attempt, err
                    );
                    return Err(RetryError::Exhausted {
                        attempts: state.attempt,
                        last_error: err,
                    });
                }
                Err(err) => {
                    state.next_delay = self.delay_with_jitter(state.attempt);
                    warn!(
                        "{} attempt {}/{} failed, retrying in {:?}: {}",
                        label, state.attempt, self.max_attempts, state.next_delay, err
                    );
                    tokio::time::sleep(state.next_delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

/// Bookkeeping for one `run` call; dropped when it returns.
#[derive(Debug)]
struct RetryState {
    attempt: u32,
    next_delay: Duration,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt: 0,
            next_delay: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Timeout,
        Unauthorized,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::Timeout => write!(f, "timeout"),
                Self::Unauthorized => write!(f, "unauthorized"),
            }
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, Self::Timeout)
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_jitter_ratio_is_clamped() {
        let policy = RetryPolicy::default().with_jitter_ratio(3.0);
        assert_eq!(policy.jitter_ratio(), 1.0);
        let policy = RetryPolicy::default().with_jitter_ratio(-0.5);
        assert_eq!(policy.jitter_ratio(), 0.0);
    }

    #[test]
    fn test_jittered_delays_never_decrease() {
        let policy = RetryPolicy::new(8, Duration::from_millis(100)).with_jitter_ratio(1.0);
        for _ in 0..50 {
            let delays: Vec<Duration> = (1..8).map(|a| policy.delay_with_jitter(a)).collect();
            assert!(delays.windows(2).all(|w| w[0] <= w[1]), "{:?}", delays);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failure_exhausts_after_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1)).with_jitter_ratio(0.0);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let result: Result<(), _> = policy
            .run("test", || {
                let calls = calls.clone();
                async move {
                    calls.lock().unwrap().push(start.elapsed());
                    Err(TestError::Timeout)
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.into_inner(), TestError::Timeout);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        // Gaps between attempts: 1s then 2s.
        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps, vec![Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_failure_stops_immediately() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("test", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Unauthorized) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(RetryError::Aborted {
                attempt: 1,
                error: TestError::Unauthorized
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let attempts = AtomicU32::new(0);

        let result = policy
            .run("test", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(TestError::Timeout)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_none_makes_a_single_attempt() {
        let policy = RetryPolicy::none();
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("test", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Timeout) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().attempts(), 1);
    }
}
