pub mod breaker;
pub mod context;
pub mod observer;
pub mod retry;
pub mod service;
pub mod types;

pub use breaker::{CircuitBreaker, CircuitOpenError};
pub use context::{Context, ContextError};
pub use observer::{MetricsObserver, NoopObserver, ResilienceObserver, TracingObserver};
pub use retry::RetryExecutor;
pub use service::CircuitBreakerService;
pub use types::{CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState, RetryConfig};
