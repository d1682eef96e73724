pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod fetch;
pub mod parse;
pub mod probe;

pub use crate::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, Context, ContextError, RetryConfig,
    RetryExecutor,
};
pub use crate::config::ProbeConfig;
pub use crate::error::{Classify, ErrorKind, ProbeError, Result};
pub use crate::parse::{ProbeOutput, StreamInfo, StreamType};
pub use crate::probe::{Manifest, ManifestFormat, ProbeReport, Prober};

/// Initialize tracing/logging on stderr
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manifest_probe=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Initialize JSON-formatted logging on stderr
pub fn init_json_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manifest_probe=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();
}
