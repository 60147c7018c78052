//! Circuit breaker guarding the bulk-write endpoint.
//!
//! Prevents cascading failures by temporarily blocking calls to a failing
//! backend. Consecutive failures open the circuit; after a reset timeout a
//! single probe is let through (half-open), and enough probe successes
//! close it again.

use crate::config::CircuitBreakerSettings;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    /// Calls proceed normally
    Closed,
    /// Calls are blocked
    Open,
    /// Testing the endpoint with probe calls
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Duration to wait before probing again (half-open)
    pub reset_timeout: Duration,

    /// Successes required to close from half-open
    pub success_threshold: u32,

    /// Name for logging
    pub name: String,
}

impl CircuitBreakerConfig {
    /// Create a configuration with default thresholds.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
            name: name.into(),
        }
    }

    /// Create a configuration from the TOML settings section.
    pub fn from_settings(name: impl Into<String>, settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            reset_timeout: Duration::from_secs(settings.reset_timeout_seconds),
            success_threshold: settings.success_threshold,
            name: name.into(),
        }
    }

    /// Set the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the reset timeout.
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Set the success threshold.
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
}

/// Circuit breaker for backend calls.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
            }),
        }
    }

    /// Check whether a call may go through right now.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_time
                    .map(|t| t.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(false);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                    info!(
                        name = %self.config.name,
                        "Circuit breaker transitioning to half-open"
                    );
                    return true;
                }
                false
            }
            CircuitState::HalfOpen => true,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    info!(name = %self.config.name, "Circuit breaker closed (recovered)");
                }
            }
            CircuitState::Open => {
                inner.failure_count = 0;
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());

        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    warn!(
                        name = %self.config.name,
                        failures = inner.failure_count,
                        "Circuit breaker opened due to failures"
                    );
                } else {
                    debug!(
                        name = %self.config.name,
                        failures = inner.failure_count,
                        threshold = self.config.failure_threshold,
                        "Circuit breaker recorded failure"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // Any failure while probing reopens the circuit
                inner.state = CircuitState::Open;
                inner.success_count = 0;
                warn!(
                    name = %self.config.name,
                    "Circuit breaker reopened from half-open state"
                );
            }
            CircuitState::Open => {}
        }
    }

    /// Get the current state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Get the consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }
}
