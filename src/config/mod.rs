use crate::circuit_breaker::{CircuitBreakerConfig, RetryConfig};
use crate::error::{ProbeError, Result};
use crate::fetch::HttpOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// HTTP client options
    #[serde(default)]
    pub http: HttpOptions,
    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,
    /// Circuit breaker policy; when absent, fetches use plain retry
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            http: HttpOptions::default(),
            retry: RetryConfig::default(),
            circuit_breaker: Some(CircuitBreakerConfig::default()),
        }
    }
}

impl ProbeConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProbeError::validation(format!("failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ProbeError::validation(format!("failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.http.validate()?;
        self.retry.validate()?;
        if let Some(cb) = &self.circuit_breaker {
            cb.validate()?;
        }
        Ok(())
    }
}
