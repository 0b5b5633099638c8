use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::retry::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_last_failure_ms: Option<u64>,
}

/// Consecutive-failure circuit breaker.
///
/// CLOSED opens after `failure_threshold` consecutive failures. OPEN rejects until
/// `recovery_timeout` has passed since the last failure, then the next
/// [`can_execute`](Self::can_execute) moves to HALF_OPEN and admits one trial.
/// The trial's outcome closes or reopens the circuit.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failures: 0,
            last_failure: None,
            trial_in_flight: false,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Replaces thresholds without touching the current state.
    pub fn set_config(&mut self, config: CircuitBreakerConfig) {
        self.config = config;
    }

    pub fn can_execute(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.recovery_elapsed() {
                    self.state = CircuitState::HalfOpen;
                    self.trial_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    false
                } else {
                    self.trial_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.trial_in_flight = false;
        self.state = CircuitState::Closed;
    }

    pub fn record_failure(&mut self) {
        self.last_failure = Some(Instant::now());
        self.trial_in_flight = false;
        match self.state {
            CircuitState::Closed => {
                self.failures = self.failures.saturating_add(1);
                if self.failures >= self.config.failure_threshold {
                    self.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => self.state = CircuitState::Open,
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Time left before an OPEN circuit admits a trial.
    pub fn retry_in(&self) -> Duration {
        match (self.state, self.last_failure) {
            (CircuitState::Open, Some(at)) => self
                .config
                .recovery_timeout
                .saturating_sub(Instant::now().saturating_duration_since(at)),
            _ => Duration::ZERO,
        }
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            state: self.state,
            failures: self.failures,
            since_last_failure_ms: self
                .last_failure
                .map(|at| Instant::now().saturating_duration_since(at).as_millis() as u64),
        }
    }

    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.failures = 0;
        self.last_failure = None;
        self.trial_in_flight = false;
    }

    fn recovery_elapsed(&self) -> bool {
        match self.last_failure {
            Some(at) => Instant::now().saturating_duration_since(at) >= self.config.recovery_timeout,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, recovery_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_timeout: Duration::from_millis(recovery_ms),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_consecutive_count() {
        let mut cb = breaker(3, 1000);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failures(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_a_single_trial() {
        let mut cb = breaker(1, 1000);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.can_execute());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_closes_the_circuit() {
        let mut cb = breaker(1, 60_000);
        cb.record_failure();
        assert!(!cb.can_execute());
        cb.reset();
        assert!(cb.can_execute());
        assert_eq!(cb.snapshot().failures, 0);
    }
}
