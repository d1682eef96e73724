use crate::circuit_breaker::{CircuitOpenError, ContextError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Result type for probe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Longest request timeout accepted from callers
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Category of a failure, used for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Connectivity, transport or server-side failure
    Network,
    /// Deadline exceeded while talking to the target
    Timeout,
    /// HTTP 4xx authentication/authorization failure
    Auth,
    /// Malformed or unusable payload
    Parsing,
    /// Bad caller input
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Auth => write!(f, "auth"),
            ErrorKind::Parsing => write!(f, "parsing"),
            ErrorKind::Validation => write!(f, "validation"),
        }
    }
}

/// Errors that can report an [`ErrorKind`].
///
/// `None` marks an error the retry layer cannot classify; such errors are
/// never retried.
pub trait Classify {
    fn kind(&self) -> Option<ErrorKind>;
}

/// Probe error types
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("network: {message}")]
    Network {
        message: String,
        url: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("timeout: request timed out after {timeout_secs} seconds")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("auth: authentication failed (HTTP {status})")]
    Auth { url: String, status: u16 },

    #[error("parsing: failed to parse {format} manifest: {message}")]
    Parsing {
        url: String,
        format: String,
        message: String,
    },

    #[error("validation: {0}")]
    Validation(String),

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ProbeError {
    /// Network failure while fetching `url`
    pub fn network<E>(url: impl Into<String>, cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let url = url.into();
        ProbeError::Network {
            message: format!("failed to fetch manifest from {}", url),
            url: Some(url),
            source: Some(cause.into()),
        }
    }

    pub fn timeout(url: impl Into<String>, timeout_secs: u64) -> Self {
        ProbeError::Timeout {
            url: url.into(),
            timeout_secs,
        }
    }

    pub fn auth(url: impl Into<String>, status: u16) -> Self {
        ProbeError::Auth {
            url: url.into(),
            status,
        }
    }

    pub fn parsing(url: impl Into<String>, format: impl Into<String>, message: impl Into<String>) -> Self {
        ProbeError::Parsing {
            url: url.into(),
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ProbeError::Validation(message.into())
    }

    /// Check whether this error has the given kind
    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }

    /// True when the call was rejected by an open circuit breaker
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ProbeError::CircuitOpen)
    }

    /// URL the error relates to, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            ProbeError::Network { url, .. } => url.as_deref(),
            ProbeError::Timeout { url, .. }
            | ProbeError::Auth { url, .. }
            | ProbeError::Parsing { url, .. } => Some(url),
            _ => None,
        }
    }
}

impl Classify for ProbeError {
    fn kind(&self) -> Option<ErrorKind> {
        match self {
            ProbeError::Network { .. } | ProbeError::CircuitOpen => Some(ErrorKind::Network),
            ProbeError::Timeout { .. } => Some(ErrorKind::Timeout),
            ProbeError::Auth { .. } => Some(ErrorKind::Auth),
            ProbeError::Parsing { .. } => Some(ErrorKind::Parsing),
            ProbeError::Validation(_) => Some(ErrorKind::Validation),
            ProbeError::Context(_) => None,
        }
    }
}

impl From<CircuitOpenError> for ProbeError {
    fn from(_: CircuitOpenError) -> Self {
        ProbeError::CircuitOpen
    }
}

/// Validate a manifest URL: http(s) scheme with a host
pub fn validate_url(raw: &str) -> Result<Url> {
    if raw.is_empty() {
        return Err(ProbeError::validation("URL cannot be empty"));
    }

    let parsed = Url::parse(raw)
        .map_err(|e| ProbeError::validation(format!("invalid URL format: {}", e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ProbeError::validation(format!(
            "unsupported URL scheme: {} (only http/https allowed)",
            parsed.scheme()
        )));
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(ProbeError::validation("URL must have a valid host")),
    }
}
