use super::types::CircuitState;
use metrics::{counter, gauge};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hooks invoked by [`RetryExecutor`](super::RetryExecutor) and
/// [`CircuitBreaker`](super::CircuitBreaker).
///
/// Attempt numbers are 1-based. Every method has an empty default so
/// implementors only override what they care about.
pub trait ResilienceObserver: Send + Sync {
    /// An attempt is about to run
    fn on_attempt(&self, _attempt: u32) {}

    /// An attempt failed with a retryable error and the executor will sleep `delay`
    fn on_retry(&self, _attempt: u32, _error: &dyn std::fmt::Display, _delay: Duration) {}

    /// The operation succeeded on `attempt`
    fn on_success(&self, _attempt: u32) {}

    /// The executor stopped retrying and is returning `error`
    fn on_give_up(&self, _attempt: u32, _error: &dyn std::fmt::Display, _retryable: bool) {}

    /// A call was rejected by an open breaker
    fn on_rejected(&self, _target: &str) {}

    /// A breaker moved between states
    fn on_state_change(&self, _target: &str, _from: CircuitState, _to: CircuitState) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ResilienceObserver for NoopObserver {}

/// Default observer: structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ResilienceObserver for TracingObserver {
    fn on_attempt(&self, attempt: u32) {
        debug!(attempt, "Executing operation");
    }

    fn on_retry(&self, attempt: u32, error: &dyn std::fmt::Display, delay: Duration) {
        warn!(
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "Operation failed, retrying"
        );
    }

    fn on_success(&self, attempt: u32) {
        if attempt > 1 {
            info!(attempt, "Operation succeeded after retry");
        }
    }

    fn on_give_up(&self, attempt: u32, error: &dyn std::fmt::Display, retryable: bool) {
        if retryable {
            warn!(attempt, error = %error, "Max retries exceeded");
        } else {
            debug!(attempt, error = %error, "Error is not retryable");
        }
    }

    fn on_rejected(&self, target: &str) {
        debug!(breaker = %target, "Circuit breaker open, rejecting request");
    }

    fn on_state_change(&self, target: &str, from: CircuitState, to: CircuitState) {
        info!(breaker = %target, from = %from, to = %to, "Circuit breaker state changed");
    }
}

/// Observer that records counters and gauges through the `metrics` facade.
///
/// Events are also forwarded to a [`TracingObserver`] so logs are kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsObserver {
    tracing: TracingObserver,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResilienceObserver for MetricsObserver {
    fn on_attempt(&self, attempt: u32) {
        counter!("probe_retry_attempts_total").increment(1);
        self.tracing.on_attempt(attempt);
    }

    fn on_retry(&self, attempt: u32, error: &dyn std::fmt::Display, delay: Duration) {
        counter!("probe_retries_total").increment(1);
        self.tracing.on_retry(attempt, error, delay);
    }

    fn on_success(&self, attempt: u32) {
        self.tracing.on_success(attempt);
    }

    fn on_give_up(&self, attempt: u32, error: &dyn std::fmt::Display, retryable: bool) {
        counter!("probe_retry_exhausted_total", "retryable" => retryable.to_string()).increment(1);
        self.tracing.on_give_up(attempt, error, retryable);
    }

    fn on_rejected(&self, target: &str) {
        counter!("probe_circuit_breaker_rejected_total", "target" => target.to_string())
            .increment(1);
        self.tracing.on_rejected(target);
    }

    fn on_state_change(&self, target: &str, from: CircuitState, to: CircuitState) {
        gauge!("probe_circuit_breaker_state", "target" => target.to_string()).set(to.as_gauge());
        counter!(
            "probe_circuit_breaker_transitions_total",
            "target" => target.to_string(),
            "to" => to.to_string()
        )
        .increment(1);
        self.tracing.on_state_change(target, from, to);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every event for assertions
    #[derive(Debug, Default)]
    pub(crate) struct RecordingObserver {
        pub(crate) events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        pub(crate) fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl ResilienceObserver for RecordingObserver {
        fn on_attempt(&self, attempt: u32) {
            self.push(format!("attempt {}", attempt));
        }

        fn on_retry(&self, attempt: u32, _error: &dyn std::fmt::Display, delay: Duration) {
            self.push(format!("retry {} after {}ms", attempt, delay.as_millis()));
        }

        fn on_success(&self, attempt: u32) {
            self.push(format!("success {}", attempt));
        }

        fn on_give_up(&self, attempt: u32, _error: &dyn std::fmt::Display, retryable: bool) {
            self.push(format!("give up {} retryable={}", attempt, retryable));
        }

        fn on_rejected(&self, target: &str) {
            self.push(format!("rejected {}", target));
        }

        fn on_state_change(&self, target: &str, from: CircuitState, to: CircuitState) {
            self.push(format!("{} {} -> {}", target, from, to));
        }
    }

    #[test]
    fn test_metrics_observer_without_recorder() {
        // No recorder installed: metrics calls are no-ops
        let observer = MetricsObserver::new();
        observer.on_attempt(1);
        observer.on_retry(1, &"boom", Duration::from_millis(100));
        observer.on_state_change("cdn.example.com", CircuitState::Closed, CircuitState::Open);
        observer.on_rejected("cdn.example.com");
    }
}
