//! Circuit breaker (spec §4.9). Grounded on the teacher's
//! `semantic::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerManager}`,
//! generalized from a fixed "N consecutive failures" counter to a sliding
//! failure window, and extended with the half-open success threshold and
//! state-change/failure/success callbacks the spec requires.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub type StateChangeCallback = Box<dyn Fn(&str, CircuitState, CircuitState) + Send + Sync>;
pub type FailureCallback = Box<dyn Fn(&str) + Send + Sync>;
pub type SuccessCallback = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub success_threshold: u32,
    pub failure_window: Duration,
}

impl Default for CircuitBreakerConfig {
    /// Spec §5 defaults: "5 failures within 60 s -> open for 30 s -> 2
    /// successes to close".
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::seconds(30),
            success_threshold: 2,
            failure_window: Duration::seconds(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }
    pub fn with_reset_timeout(mut self, d: Duration) -> Self {
        self.reset_timeout = d;
        self
    }
    pub fn with_success_threshold(mut self, n: u32) -> Self {
        self.success_threshold = n;
        self
    }
    pub fn with_failure_window(mut self, d: Duration) -> Self {
        self.failure_window = d;
        self
    }
}

struct Inner {
    state: CircuitState,
    failures: VecDeque<DateTime<Utc>>,
    success_count: u32,
    opened_at: Option<DateTime<Utc>>,
}

/// A single named circuit breaker. Counters and state mutate under one
/// internal lock (spec §5 "mutated under a per-breaker lock equivalent");
/// callbacks fire after the lock is released (spec §5 "transitions fire
/// callbacks outside the critical section").
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    on_state_change: Option<StateChangeCallback>,
    on_failure: Option<FailureCallback>,
    on_success: Option<SuccessCallback>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                success_count: 0,
                opened_at: None,
            }),
            on_state_change: None,
            on_failure: None,
            on_success: None,
        }
    }

    pub fn with_state_change_callback(mut self, callback: StateChangeCallback) -> Self {
        self.on_state_change = Some(callback);
        self
    }
    pub fn with_failure_callback(mut self, callback: FailureCallback) -> Self {
        self.on_failure = Some(callback);
        self
    }
    pub fn with_success_callback(mut self, callback: SuccessCallback) -> Self {
        self.on_success = Some(callback);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// When the circuit is open, the moment a half-open probe becomes
    /// allowed (spec §3 "an entry is fresh while..."-style boundary, applied
    /// to `resetAt = openedAt + resetTimeoutMs").
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        let inner = self.inner.lock().unwrap();
        inner.opened_at.map(|opened| opened + self.config.reset_timeout)
    }

    /// Whether a call may proceed right now (spec §4.9 `canExecute`). In the
    /// `Open` state past `resetAt`, this also performs the open -> half-open
    /// transition as a side effect, matching "transition to half-open on the
    /// next check".
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let reset_at = inner.opened_at.unwrap_or_else(Utc::now) + self.config.reset_timeout;
                if Utc::now() >= reset_at {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a failed call. In `Closed`, opens once `failure_threshold`
    /// failures fall inside the sliding `failure_window`. In `HalfOpen`, any
    /// failure reopens immediately with a fresh `resetTimeoutMs` (spec
    /// §4.9).
    pub fn record_failure(&self) {
        let mut opened = false;
        {
            let mut inner = self.inner.lock().unwrap();
            let now = Utc::now();
            match inner.state {
                CircuitState::Closed => {
                    inner.failures.push_back(now);
                    let window_start = now - self.config.failure_window;
                    while inner.failures.front().is_some_and(|t| *t < window_start) {
                        inner.failures.pop_front();
                    }
                    if inner.failures.len() as u32 >= self.config.failure_threshold {
                        inner.opened_at = Some(now);
                        self.transition(&mut inner, CircuitState::Open);
                        opened = true;
                    }
                }
                CircuitState::HalfOpen => {
                    inner.opened_at = Some(now);
                    inner.failures.clear();
                    self.transition(&mut inner, CircuitState::Open);
                    opened = true;
                }
                CircuitState::Open => {}
            }
        }
        let _ = opened;
        if let Some(callback) = &self.on_failure {
            callback(&self.name);
        }
    }

    /// Record a successful call. In `Closed`, resets the failure window. In
    /// `HalfOpen`, counts toward `success_threshold`; reaching it closes the
    /// circuit and clears all counters (spec §4.9).
    pub fn record_success(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            match inner.state {
                CircuitState::Closed => {
                    inner.failures.clear();
                }
                CircuitState::HalfOpen => {
                    inner.success_count += 1;
                    if inner.success_count >= self.config.success_threshold {
                        inner.success_count = 0;
                        inner.failures.clear();
                        inner.opened_at = None;
                        self.transition(&mut inner, CircuitState::Closed);
                    }
                }
                CircuitState::Open => {}
            }
        }
        if let Some(callback) = &self.on_success {
            callback(&self.name);
        }
    }

    /// Force the circuit open regardless of thresholds.
    pub fn trip(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.opened_at = Some(Utc::now());
        self.transition(&mut inner, CircuitState::Open);
    }

    /// Force the circuit closed and clear all counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.clear();
        inner.success_count = 0;
        inner.opened_at = None;
        self.transition(&mut inner, CircuitState::Closed);
    }

    /// Force the circuit into the probing half-open state.
    pub fn force_half_open(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.success_count = 0;
        self.transition(&mut inner, CircuitState::HalfOpen);
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        if from != to {
            if let Some(callback) = &self.on_state_change {
                callback(&self.name, from, to);
            }
        }
    }
}

/// Keyed lookup of circuit breakers, one per service name, so repeated
/// calls for the same service share failure/success state (spec §4.9 "A
/// registry keyed by service name returns the same breaker for a given
/// name").
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create_with(name, None)
    }

    pub fn get_or_create_with(&self, name: &str, config_override: Option<CircuitBreakerConfig>) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let config = config_override.unwrap_or_else(|| self.default_config.clone());
                Arc::new(CircuitBreaker::new(name, config))
            })
            .clone()
    }

    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    pub fn get_open_circuits(&self) -> Vec<String> {
        self.breakers
            .iter()
            .filter(|entry| entry.value().state() == CircuitState::Open)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn get_all_status(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    pub fn clear(&self) {
        self.breakers.clear();
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed_and_allows_requests() {
        let cb = CircuitBreaker::new("svc", CircuitBreakerConfig::default());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn opens_after_exactly_the_failure_threshold() {
        let cb = CircuitBreaker::new("svc", CircuitBreakerConfig::default().with_failure_threshold(3));
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn success_resets_the_failure_window_while_closed() {
        let cb = CircuitBreaker::new("svc", CircuitBreakerConfig::default().with_failure_threshold(3));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let cb = CircuitBreaker::new(
            "svc",
            CircuitBreakerConfig::default()
                .with_failure_threshold(1)
                .with_success_threshold(2),
        );
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.force_half_open();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn any_failure_in_half_open_reopens_immediately() {
        let cb = CircuitBreaker::new("svc", CircuitBreakerConfig::default().with_failure_threshold(1));
        cb.record_failure();
        cb.force_half_open();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn registry_returns_the_same_breaker_for_a_name() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.get_or_create("svc-a");
        let b = registry.get_or_create("svc-a");
        a.record_failure();
        assert_eq!(b.state(), CircuitState::Closed);
        for _ in 0..5 {
            a.record_failure();
        }
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn manual_trip_and_reset_override_thresholds() {
        let cb = CircuitBreaker::new("svc", CircuitBreakerConfig::default());
        cb.trip();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn state_change_callback_fires_on_transition_only() {
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let transitions_clone = transitions.clone();
        let cb = CircuitBreaker::new("svc", CircuitBreakerConfig::default().with_failure_threshold(1))
            .with_state_change_callback(Box::new(move |_name, from, to| {
                transitions_clone.lock().unwrap().push((from, to));
            }));
        cb.record_success(); // closed -> closed, no callback
        cb.record_failure(); // closed -> open
        let log = transitions.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], (CircuitState::Closed, CircuitState::Open));
    }
}
