use crate::error::{ProbeError, Result, MAX_TIMEOUT_SECS};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, ORIGIN, REFERER,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const MANIFEST_ACCEPT: &str = "application/dash+xml,application/vnd.ms-sstr+xml,application/vnd.apple.mpegurl,application/x-mpegURL,application/vnd.ms-playready.media.pya,application/vnd.ms-playready.media.pyv,video/mp4,audio/mp4,*/*";

/// Largest manifest body accepted
pub const MAX_MANIFEST_BYTES: usize = 50 * 1024 * 1024;

/// HTTP options for manifest requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpOptions {
    /// Proxy server URL (e.g., "http://proxy:8080")
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// User-Agent header; a desktop Chrome UA when unset
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Extra headers applied after the defaults
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
    /// Request timeout in seconds; 0 means the 30 second default
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Disable gzip/deflate response compression
    #[serde(default)]
    pub disable_compression: bool,
    /// Disable browser-like headers (Origin, Referer, ...)
    #[serde(default)]
    pub disable_camouflage: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            proxy_url: None,
            user_agent: None,
            custom_headers: HashMap::new(),
            timeout_secs: default_timeout_secs(),
            disable_compression: false,
            disable_camouflage: false,
        }
    }
}

impl HttpOptions {
    /// Effective timeout in seconds
    pub fn timeout_secs(&self) -> u64 {
        match self.timeout_secs {
            0 => default_timeout_secs(),
            secs => secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(proxy) = &self.proxy_url {
            Url::parse(proxy)
                .map_err(|e| ProbeError::validation(format!("invalid proxy URL: {}", e)))?;
        }

        if self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ProbeError::validation(format!(
                "timeout cannot exceed {} seconds",
                MAX_TIMEOUT_SECS
            )));
        }

        Ok(())
    }
}

/// HTTP client configured for fetching manifests from one origin
#[derive(Debug, Clone)]
pub struct ManifestFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_body_bytes: usize,
}

impl ManifestFetcher {
    /// Build a fetcher whose browser-like headers match `target`'s origin
    pub fn new(target: &Url, options: &HttpOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .timeout(options.timeout())
            .gzip(!options.disable_compression)
            .deflate(!options.disable_compression)
            .default_headers(build_headers(target, options)?);

        if let Some(proxy) = &options.proxy_url {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| ProbeError::validation(format!("invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ProbeError::validation(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_secs: options.timeout_secs(),
            max_body_bytes: MAX_MANIFEST_BYTES,
        })
    }

    /// Override the body size cap
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Fetch the manifest body at `url`.
    ///
    /// Transport timeouts become `Timeout`, 4xx responses `Auth`, and every
    /// other failure (including 5xx and empty bodies) `Network`. A body
    /// larger than the size cap is a `Parsing` error and is never buffered
    /// past the cap.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        debug!(url = %url, status = status.as_u16(), "Manifest response received");

        if status.is_client_error() {
            return Err(ProbeError::auth(url, status.as_u16()));
        }
        if status.is_server_error() {
            return Err(ProbeError::network(
                url,
                format!("server error: HTTP {}", status.as_u16()),
            ));
        }
        if status != reqwest::StatusCode::OK {
            return Err(ProbeError::network(
                url,
                format!("unexpected status code: {}", status.as_u16()),
            ));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                return Err(self.too_large(url, length));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.transport_error(url, e))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(self.too_large(url, (body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(ProbeError::network(url, "received empty response"));
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn too_large(&self, url: &str, size: u64) -> ProbeError {
        debug!(url = %url, size, limit = self.max_body_bytes, "Manifest exceeds size limit");
        ProbeError::parsing(
            url,
            "unknown",
            format!("manifest too large (over {} bytes, got at least {})", self.max_body_bytes, size),
        )
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> ProbeError {
        if err.is_timeout() {
            ProbeError::timeout(url, self.timeout_secs)
        } else {
            ProbeError::network(url, err)
        }
    }
}

/// Default headers: manifest Accept, browser camouflage, then custom headers
fn build_headers(target: &Url, options: &HttpOptions) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(MANIFEST_ACCEPT));

    if !options.disable_camouflage {
        let origin = target.origin().ascii_serialization();
        let referer = format!("{}/", origin);

        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9,fr;q=0.8"),
        );
        headers.insert(ORIGIN, header_value(&origin)?);
        headers.insert(REFERER, header_value(&referer)?);
        headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );
    }

    for (name, value) in &options.custom_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ProbeError::validation(format!("invalid header name '{}': {}", name, e)))?;
        headers.insert(name, header_value(value)?);
    }

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ProbeError::validation(format!("invalid header value '{}': {}", value, e)))
}
