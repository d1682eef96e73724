use super::breaker::CircuitBreaker;
use super::observer::{ResilienceObserver, TracingObserver};
use super::types::{CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Circuit breaker service managing one breaker per target
#[derive(Clone)]
pub struct CircuitBreakerService {
    /// Circuit breakers per target
    breakers: Arc<DashMap<String, Arc<CircuitBreaker>>>,
    /// Configuration applied to every new breaker
    config: CircuitBreakerConfig,
    observer: Arc<dyn ResilienceObserver>,
}

impl std::fmt::Debug for CircuitBreakerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerService")
            .field("targets", &self.breakers.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CircuitBreakerService {
    /// Create a new circuit breaker service
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    pub fn with_observer(config: CircuitBreakerConfig, observer: Arc<dyn ResilienceObserver>) -> Self {
        Self {
            breakers: Arc::new(DashMap::new()),
            config,
            observer,
        }
    }

    /// Get or create the circuit breaker for a target
    pub fn breaker(&self, target: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(target.to_string())
            .or_insert_with(|| {
                debug!(breaker = target, "Creating new circuit breaker");
                Arc::new(CircuitBreaker::with_observer(
                    target,
                    self.config.clone(),
                    self.observer.clone(),
                ))
            })
            .clone()
    }

    /// Get the state of the circuit breaker for a target
    pub async fn state(&self, target: &str) -> CircuitState {
        match self.existing(target) {
            Some(breaker) => breaker.state().await,
            None => CircuitState::Closed,
        }
    }

    /// Get metrics for a target
    pub async fn metrics(&self, target: &str) -> Option<CircuitBreakerMetrics> {
        match self.existing(target) {
            Some(breaker) => Some(breaker.metrics().await),
            None => None,
        }
    }

    /// Get all target names with circuit breakers
    pub fn targets(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    /// Get metrics and state for all targets
    pub async fn all_metrics(&self) -> Vec<(String, CircuitBreakerMetrics, CircuitState)> {
        // Collect first so no map shard lock is held across an await
        let breakers: Vec<_> = self
            .breakers
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut results = Vec::with_capacity(breakers.len());
        for (target, breaker) in breakers {
            let metrics = breaker.metrics().await;
            let state = breaker.state().await;
            results.push((target, metrics, state));
        }
        results
    }

    fn existing(&self, target: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(target).map(|entry| entry.value().clone())
    }
}
