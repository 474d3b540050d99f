//! Per-provider circuit breaker for quote sources.
//!
//! A provider that keeps failing with transient errors is skipped for a
//! while instead of being retried on every position of every cycle:
//!
//! - **Closed**: requests go through, consecutive failures are counted.
//! - **Open**: requests are blocked until the recovery timeout elapses.
//! - **HalfOpen**: trial requests are allowed; enough successes close the
//!   circuit, a single failure opens it again.
//!
//! State is in-memory. In one-shot mode it lives for a single cycle; in
//! scheduled mode it spans cycles.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::Instant;

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_HALF_OPEN_SUCCESSES: u32 = 1;

/// Externally visible circuit state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Internal state carries the data each phase needs.
#[derive(Clone, Copy, Debug)]
enum Circuit {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { successes: u32 },
}

impl Circuit {
    fn state(&self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

impl Default for Circuit {
    fn default() -> Self {
        Self::Closed { failures: 0 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive transient failures before the circuit opens.
    pub failure_threshold: u32,
    /// Time spent open before trial requests are let through.
    pub recovery_timeout: Duration,
    /// Trial successes needed to close the circuit again.
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            half_open_success_threshold: DEFAULT_HALF_OPEN_SUCCESSES,
        }
    }
}

/// Thread-safe circuit breaker keyed by provider id.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    circuits: Mutex<HashMap<&'static str, Circuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Recovers from a poisoned lock; a stale failure count beats a panic.
    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Whether `provider` may be called now. Moves an open circuit to
    /// half-open once the recovery timeout has elapsed.
    pub fn is_allowed(&self, provider: &'static str) -> bool {
        let mut circuits = self.lock();
        let circuit = circuits.entry(provider).or_default();

        match *circuit {
            Circuit::Closed { .. } | Circuit::HalfOpen { .. } => true,
            Circuit::Open { since } if since.elapsed() >= self.config.recovery_timeout => {
                info!("Circuit breaker: '{}' Open -> HalfOpen", provider);
                *circuit = Circuit::HalfOpen { successes: 0 };
                true
            }
            Circuit::Open { .. } => false,
        }
    }

    pub fn record_success(&self, provider: &'static str) {
        let mut circuits = self.lock();
        let circuit = circuits.entry(provider).or_default();

        match *circuit {
            Circuit::Closed { failures } => {
                if failures > 0 {
                    debug!("Circuit breaker: '{}' failure count reset", provider);
                }
                *circuit = Circuit::Closed { failures: 0 };
            }
            Circuit::HalfOpen { successes } => {
                let successes = successes + 1;
                if successes >= self.config.half_open_success_threshold {
                    info!(
                        "Circuit breaker: closing '{}' after {} trial successes",
                        provider, successes
                    );
                    *circuit = Circuit::Closed { failures: 0 };
                } else {
                    *circuit = Circuit::HalfOpen { successes };
                }
            }
            Circuit::Open { .. } => {
                debug!("Circuit breaker: ignoring success for open '{}'", provider);
            }
        }
    }

    /// Record a transient failure. Non-transient errors should not be recorded.
    pub fn record_failure(&self, provider: &'static str) {
        let mut circuits = self.lock();
        let circuit = circuits.entry(provider).or_default();

        match *circuit {
            Circuit::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.config.failure_threshold {
                    warn!(
                        "Circuit breaker: opening '{}' after {} consecutive failures",
                        provider, failures
                    );
                    *circuit = Circuit::Open {
                        since: Instant::now(),
                    };
                } else {
                    debug!(
                        "Circuit breaker: '{}' failure {}/{}",
                        provider, failures, self.config.failure_threshold
                    );
                    *circuit = Circuit::Closed { failures };
                }
            }
            Circuit::HalfOpen { .. } => {
                warn!("Circuit breaker: trial request for '{}' failed, reopening", provider);
                *circuit = Circuit::Open {
                    since: Instant::now(),
                };
            }
            Circuit::Open { .. } => {
                *circuit = Circuit::Open {
                    since: Instant::now(),
                };
            }
        }
    }

    pub fn state(&self, provider: &'static str) -> CircuitState {
        self.lock()
            .get(provider)
            .map(Circuit::state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn reset_all(&self) {
        self.lock().clear();
        info!("Circuit breaker: all circuits reset");
    }
}
