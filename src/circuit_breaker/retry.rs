use super::breaker::{CircuitBreaker, CircuitOpenError};
use super::context::{Context, ContextError};
use super::observer::{ResilienceObserver, TracingObserver};
use super::types::{CircuitBreakerConfig, RetryConfig};
use crate::error::Classify;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Share of the uncapped delay that jitter may add on top
const JITTER_FACTOR: f64 = 0.25;

/// Breaker target name used when the executor owns its breaker
const DEFAULT_TARGET: &str = "default";

/// Retry executor with exponential backoff and an optional circuit breaker
pub struct RetryExecutor {
    config: RetryConfig,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    observer: Arc<dyn ResilienceObserver>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config)
            .field("circuit_breaker", &self.circuit_breaker)
            .finish_non_exhaustive()
    }
}

impl RetryExecutor {
    /// Create a new retry executor.
    ///
    /// `None` for the breaker config means plain retry with no breaker.
    pub fn new(config: RetryConfig, breaker_config: Option<CircuitBreakerConfig>) -> Self {
        Self::with_observer(config, breaker_config, Arc::new(TracingObserver))
    }

    /// Create a retry executor that reports attempts, retries and breaker
    /// transitions to `observer`
    pub fn with_observer(
        config: RetryConfig,
        breaker_config: Option<CircuitBreakerConfig>,
        observer: Arc<dyn ResilienceObserver>,
    ) -> Self {
        let circuit_breaker = breaker_config.map(|cb_config| {
            Arc::new(CircuitBreaker::with_observer(
                DEFAULT_TARGET,
                cb_config,
                observer.clone(),
            ))
        });

        Self {
            config,
            circuit_breaker,
            observer,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.circuit_breaker.as_ref()
    }

    /// Run `operation` with retries.
    ///
    /// With a breaker configured, the whole retry sequence is one guarded
    /// call; a rejected call makes no attempt at all.
    pub async fn execute<F, Fut, T, E>(&self, ctx: &Context, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + From<ContextError> + From<CircuitOpenError> + std::fmt::Display,
    {
        match &self.circuit_breaker {
            Some(breaker) => {
                breaker
                    .execute(|| self.execute_with_retry(ctx, operation))
                    .await
            }
            None => self.execute_with_retry(ctx, operation).await,
        }
    }

    async fn execute_with_retry<F, Fut, T, E>(&self, ctx: &Context, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + From<ContextError> + std::fmt::Display,
    {
        let mut attempt: u32 = 0;

        loop {
            if let Some(err) = ctx.err() {
                return Err(err.into());
            }

            self.observer.on_attempt(attempt + 1);
            let err = match operation().await {
                Ok(value) => {
                    self.observer.on_success(attempt + 1);
                    return Ok(value);
                }
                Err(err) => err,
            };

            let retryable = self.is_retryable(&err);
            if !retryable || attempt >= self.config.max_retries {
                self.observer.on_give_up(attempt + 1, &err, retryable);
                return Err(err);
            }

            let delay = self.calculate_delay(attempt);
            self.observer.on_retry(attempt + 1, &err, delay);

            tokio::select! {
                biased;
                reason = ctx.done() => return Err(reason.into()),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    /// Unclassified errors are never retried
    fn is_retryable<E: Classify>(&self, err: &E) -> bool {
        err.kind()
            .map_or(false, |kind| self.config.is_retryable(kind))
    }

    /// Delay after the failure of zero-based `attempt`.
    ///
    /// `initial_delay * multiplier^attempt`, plus up to 25% of that as jitter
    /// when enabled, capped at `max_delay`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay().as_nanos() as f64
            * self
                .config
                .backoff_multiplier
                .powi(attempt.min(i32::MAX as u32) as i32);

        let mut delay = base;
        if self.config.jitter {
            delay += base * JITTER_FACTOR * rand::thread_rng().gen::<f64>();
        }

        let max = self.config.max_delay().as_nanos() as f64;
        Duration::from_nanos(delay.min(max) as u64)
    }
}
