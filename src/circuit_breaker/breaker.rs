use super::observer::{ResilienceObserver, TracingObserver};
use super::types::{CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// Returned when a call is rejected without running because the circuit is open
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("circuit breaker is open")]
pub struct CircuitOpenError;

/// Circuit breaker for a single target
pub struct CircuitBreaker {
    /// Configuration
    config: CircuitBreakerConfig,
    /// Current state
    state: Arc<RwLock<State>>,
    /// Target identifier
    target: String,
    observer: Arc<dyn ResilienceObserver>,
}

#[derive(Debug)]
struct State {
    /// Current circuit state
    circuit_state: CircuitState,
    /// Failures since the last success
    failures: u32,
    /// Guarded calls completed while half-open
    half_open_requests: u32,
    /// Time of the most recent failure
    last_failure: Option<Instant>,
    /// Metrics
    metrics: CircuitBreakerMetrics,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("target", &self.target)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(target: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_observer(target, config, Arc::new(TracingObserver))
    }

    /// Create a circuit breaker reporting to `observer`
    pub fn with_observer(
        target: impl Into<String>,
        config: CircuitBreakerConfig,
        observer: Arc<dyn ResilienceObserver>,
    ) -> Self {
        let target = target.into();
        info!(
            breaker = %target,
            enabled = config.enabled,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout_ms,
            half_open_max_requests = config.half_open_max_requests,
            "Creating circuit breaker"
        );

        Self {
            config,
            state: Arc::new(RwLock::new(State {
                circuit_state: CircuitState::Closed,
                failures: 0,
                half_open_requests: 0,
                last_failure: None,
                metrics: CircuitBreakerMetrics::default(),
            })),
            target,
            observer,
        }
    }

    /// Run `operation` under breaker protection.
    ///
    /// When the breaker is disabled the operation runs unguarded. When the
    /// circuit rejects the call the operation is never invoked.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>,
    {
        if !self.config.enabled {
            return operation().await;
        }

        if !self.allow_request().await {
            self.observer.on_rejected(&self.target);
            return Err(CircuitOpenError.into());
        }

        let result = operation().await;
        self.record_result(result.is_ok()).await;
        result
    }

    /// Decide whether a call may proceed, moving Open to HalfOpen once the
    /// reset timeout has elapsed
    async fn allow_request(&self) -> bool {
        let mut state = self.state.write().await;

        let current = state.circuit_state;
        let allowed = match current {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let expired = state
                    .last_failure
                    .map_or(true, |at| at.elapsed() > self.config.reset_timeout());
                if expired {
                    self.transition(&mut state, CircuitState::HalfOpen);
                    state.half_open_requests = 0;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                let allowed = state.half_open_requests < self.config.half_open_max_requests;
                if allowed {
                    debug!(
                        breaker = %self.target,
                        half_open_requests = state.half_open_requests,
                        max = self.config.half_open_max_requests,
                        "Allowing half-open probe request"
                    );
                }
                allowed
            }
        };

        if allowed {
            state.metrics.total_requests += 1;
        } else {
            state.metrics.rejected_requests += 1;
        }
        allowed
    }

    /// Update state with the outcome of a guarded call
    async fn record_result(&self, success: bool) {
        let mut state = self.state.write().await;

        if state.circuit_state == CircuitState::HalfOpen {
            state.half_open_requests += 1;
        }

        if success {
            state.metrics.successful_requests += 1;
            state.failures = 0;
            if state.circuit_state == CircuitState::HalfOpen {
                self.transition(&mut state, CircuitState::Closed);
            }
            return;
        }

        state.metrics.failed_requests += 1;
        state.failures += 1;
        state.last_failure = Some(Instant::now());

        debug!(
            breaker = %self.target,
            failures = state.failures,
            threshold = self.config.failure_threshold,
            state = %state.circuit_state,
            "Guarded request failed"
        );

        let current = state.circuit_state;
        match current {
            // A single failed probe is enough to reopen
            CircuitState::HalfOpen => self.transition(&mut state, CircuitState::Open),
            CircuitState::Closed if state.failures >= self.config.failure_threshold => {
                self.transition(&mut state, CircuitState::Open)
            }
            _ => {}
        }
    }

    /// Get current state
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.circuit_state
    }

    /// Failures recorded since the last success
    pub async fn failure_count(&self) -> u32 {
        self.state.read().await.failures
    }

    /// Get metrics
    pub async fn metrics(&self) -> CircuitBreakerMetrics {
        self.state.read().await.metrics.clone()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn transition(&self, state: &mut State, to: CircuitState) {
        let from = state.circuit_state;
        if from == to {
            return;
        }

        state.circuit_state = to;
        match to {
            CircuitState::Open => state.metrics.circuit_opened_count += 1,
            CircuitState::HalfOpen => state.metrics.circuit_half_opened_count += 1,
            CircuitState::Closed => state.metrics.circuit_closed_count += 1,
        }
        self.observer.on_state_change(&self.target, from, to);
    }
}
