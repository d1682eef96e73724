//! Manifest probing: validation, resilient fetch, format detection and
//! stream extraction.

use crate::circuit_breaker::{
    CircuitBreakerService, CircuitState, Context, ResilienceObserver, RetryExecutor,
    TracingObserver,
};
use crate::config::ProbeConfig;
use crate::error::{validate_url, Result};
use crate::fetch::ManifestFetcher;
use crate::parse::{parse_hls, parse_mpd, ProbeOutput, StreamInfo};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

pub use crate::fetch::MAX_MANIFEST_BYTES;

/// Detected manifest format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    /// HLS playlist (M3U8)
    Hls,
    /// DASH media presentation description (MPD)
    Dash,
}

impl ManifestFormat {
    /// HLS playlists start with `#EXTM3U`; anything else is treated as DASH
    pub fn detect(body: &str) -> Self {
        if body.contains("#EXTM3U") {
            ManifestFormat::Hls
        } else {
            ManifestFormat::Dash
        }
    }
}

impl std::fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestFormat::Hls => write!(f, "HLS"),
            ManifestFormat::Dash => write!(f, "MPD"),
        }
    }
}

/// A fetched and parsed manifest
#[derive(Debug, Clone)]
pub struct Manifest {
    pub url: String,
    pub format: ManifestFormat,
    pub body: String,
    pub output: ProbeOutput,
}

impl Manifest {
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// Summary printed by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub url: String,
    pub format: ManifestFormat,
    pub size: usize,
    pub streams: Vec<StreamInfo>,
    pub circuit_state: Option<CircuitState>,
}

/// Fetches manifests with retries and a circuit breaker per host
#[derive(Debug)]
pub struct Prober {
    config: ProbeConfig,
    executor: RetryExecutor,
    breakers: Option<CircuitBreakerService>,
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Result<Self> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    pub fn with_observer(config: ProbeConfig, observer: Arc<dyn ResilienceObserver>) -> Result<Self> {
        config.validate()?;

        // Breakers live in the per-host service, not in the executor
        let executor = RetryExecutor::with_observer(config.retry.clone(), None, observer.clone());
        let breakers = config
            .circuit_breaker
            .clone()
            .map(|cb_config| CircuitBreakerService::with_observer(cb_config, observer));

        Ok(Self {
            config,
            executor,
            breakers,
        })
    }

    pub fn breakers(&self) -> Option<&CircuitBreakerService> {
        self.breakers.as_ref()
    }

    /// Validate `url`, fetch it under retry and circuit breaking, detect its
    /// format and extract its streams.
    ///
    /// Parse failures surface after the breaker has recorded a successful
    /// fetch and are never retried.
    pub async fn probe(&self, ctx: &Context, url: &str) -> Result<Manifest> {
        let start = Instant::now();
        info!(url = %url, "Starting manifest probe");

        let parsed = validate_url(url).map_err(|e| {
            error!(url = %url, error = %e, "URL validation failed");
            e
        })?;
        let host = parsed.host_str().unwrap_or_default().to_string();
        let url = parsed.to_string();

        let fetcher = ManifestFetcher::new(&parsed, &self.config.http)?;
        let operation = || fetcher.fetch(&url);

        let fetched = match &self.breakers {
            Some(service) => {
                let breaker = service.breaker(&host);
                breaker
                    .execute(|| self.executor.execute(ctx, operation))
                    .await
            }
            None => self.executor.execute(ctx, operation).await,
        };

        let body = fetched.map_err(|e| {
            error!(
                url = %url,
                elapsed_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "Manifest fetch failed"
            );
            e
        })?;

        let format = ManifestFormat::detect(&body);
        debug!(url = %url, format = %format, size = body.len(), "Detected manifest format");

        let parse_start = Instant::now();
        let output = match format {
            ManifestFormat::Hls => parse_hls(&body, &url),
            ManifestFormat::Dash => parse_mpd(&body, &url),
        }
        .map_err(|e| {
            error!(
                url = %url,
                parse_ms = parse_start.elapsed().as_millis() as u64,
                error = %e,
                "Manifest parsing failed"
            );
            e
        })?;

        info!(
            url = %url,
            format = %format,
            size = body.len(),
            streams_found = output.streams.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Manifest probe completed successfully"
        );

        Ok(Manifest {
            url,
            format,
            body,
            output,
        })
    }

    /// Probe and summarize, including the host breaker's state
    pub async fn report(&self, ctx: &Context, url: &str) -> Result<ProbeReport> {
        let manifest = self.probe(ctx, url).await?;

        let circuit_state = match (&self.breakers, validate_url(&manifest.url)) {
            (Some(service), Ok(parsed)) => {
                Some(service.state(parsed.host_str().unwrap_or_default()).await)
            }
            _ => None,
        };

        Ok(ProbeReport {
            size: manifest.size(),
            url: manifest.url,
            format: manifest.format,
            streams: manifest.output.streams,
            circuit_state,
        })
    }
}
