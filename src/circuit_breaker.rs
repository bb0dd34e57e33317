use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;
use crate::error::HedgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

const WINDOW_SIZE: usize = 100;
const MIN_CALLS_FOR_RATE: usize = 10;
const FAILURE_RATE_THRESHOLD: f64 = 0.5;

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    recent_outcomes: VecDeque<bool>,
}

/// Closed/open/half-open breaker wrapping one collaborator class (venue,
/// pool, notifier). Opens on `failure_threshold` consecutive failures, or
/// when the windowed failure rate crosses `FAILURE_RATE_THRESHOLD` with
/// enough samples; half-opens after `open_timeout_secs`; closes again after
/// `success_threshold` consecutive successes while half-open, or reopens on
/// a single half-open failure.
pub struct CircuitBreaker {
    collaborator: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(collaborator: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            collaborator: collaborator.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                recent_outcomes: VecDeque::with_capacity(WINDOW_SIZE),
            }),
        }
    }

    fn failure_rate(inner: &Inner) -> f64 {
        if inner.recent_outcomes.is_empty() {
            return 0.0;
        }
        let failures = inner.recent_outcomes.iter().filter(|ok| !**ok).count();
        failures as f64 / inner.recent_outcomes.len() as f64
    }

    /// Call before invoking the collaborator. Returns a `CircuitOpen` error
    /// if the breaker is open (or half-open but a probe is already due and
    /// not yet resolved); transitions Open -> HalfOpen once the timeout has
    /// elapsed.
    pub fn before_call(&self) -> Result<(), HedgeError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= Duration::from_secs(self.config.open_timeout_secs) {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    Ok(())
                } else {
                    Err(HedgeError::CircuitOpen {
                        collaborator: self.collaborator.clone(),
                        reset_after_secs: self.config.open_timeout_secs.saturating_sub(elapsed.as_secs()),
                    })
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures = 0;
        inner.consecutive_successes += 1;
        push_outcome(&mut inner.recent_outcomes, true);

        if inner.state == CircuitState::HalfOpen && inner.consecutive_successes >= self.config.success_threshold {
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_successes = 0;
        inner.consecutive_failures += 1;
        push_outcome(&mut inner.recent_outcomes, false);

        let should_open = inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.config.failure_threshold
            || (inner.recent_outcomes.len() >= MIN_CALLS_FOR_RATE && Self::failure_rate(&inner) > FAILURE_RATE_THRESHOLD);

        if should_open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().state == CircuitState::Closed
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().unwrap().state == CircuitState::Open
    }

    pub fn is_half_open(&self) -> bool {
        self.inner.lock().unwrap().state == CircuitState::HalfOpen
    }
}

fn push_outcome(outcomes: &mut VecDeque<bool>, ok: bool) {
    if outcomes.len() >= WINDOW_SIZE {
        outcomes.pop_front();
    }
    outcomes.push_back(ok);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("venue", CircuitBreakerConfig { failure_threshold: 3, success_threshold: 2, open_timeout_secs: 0 })
    }

    #[test]
    fn starts_closed() {
        let cb = breaker();
        assert!(cb.is_closed());
        assert!(cb.before_call().is_ok());
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_closed());
        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        assert!(cb.is_open());
        // open_timeout_secs = 0, so the next before_call transitions to half-open.
        cb.before_call().unwrap();
        assert!(cb.is_half_open());
        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        cb.before_call().unwrap();
        assert!(cb.is_half_open());
        cb.record_success();
        assert!(cb.is_half_open());
        cb.record_success();
        assert!(cb.is_closed());
    }

    #[test]
    fn success_resets_consecutive_failure_count() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_closed());
    }
}
