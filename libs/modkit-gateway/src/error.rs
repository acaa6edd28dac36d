use std::time::Duration;
use thiserror::Error;

/// Classification of a request that failed below the business layer.
///
/// Derived from the HTTP status (when one exists) and refined by inspecting
/// the transport's own error text for timeout and connectivity cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TransportFailureKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RequestTimeout,
    TooManyRequests,
    ServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    HttpVersionNotSupported,
    /// Network failure while the device reports being online
    ServerUnreachable,
    /// Network failure while the device reports being offline
    Offline,
    /// No status, or a status outside the known table
    Unknown,
}

impl TransportFailureKind {
    /// Map an HTTP status code through the fixed status table.
    #[must_use]
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(400) => Self::BadRequest,
            Some(401) => Self::Unauthorized,
            Some(403) => Self::Forbidden,
            Some(404) => Self::NotFound,
            Some(408) => Self::RequestTimeout,
            Some(429) => Self::TooManyRequests,
            Some(500) => Self::ServerError,
            Some(501) => Self::NotImplemented,
            Some(502) => Self::BadGateway,
            Some(503) => Self::ServiceUnavailable,
            Some(504) => Self::GatewayTimeout,
            Some(505) => Self::HttpVersionNotSupported,
            _ => Self::Unknown,
        }
    }

    /// Whether this failure is a timeout of any kind.
    #[must_use]
    pub fn is_timeout(self) -> bool {
        matches!(self, Self::RequestTimeout | Self::GatewayTimeout)
    }
}

/// Rejection returned by [`Gateway::request`](crate::Gateway::request).
///
/// `Display` yields the user-facing message for every category, so callers
/// can surface `err.to_string()` directly.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// Gated request waited on a login that did not settle in time
    #[error("{message}")]
    LoginTimeout { timeout: Duration, message: String },

    /// Gated request waited on a login that was reported as failed
    #[error("{reason}")]
    LoginFailed { reason: String },

    /// Backend rejected the session (business unauthorized code)
    #[error("{message}")]
    SessionExpired { message: String },

    /// Any other non-success business code; `code` is `None` when the
    /// envelope's code was not an integer
    #[error("{message}")]
    Business { code: Option<i64>, message: String },

    /// HTTP or network failure without a usable business envelope
    #[error("{message}")]
    Transport {
        kind: TransportFailureKind,
        status: Option<u16>,
        message: String,
    },

    /// Request could not be built (bad header, unserializable body)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Resolved payload did not match the requested type
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GatewayError {
    /// Whether the request failed because something took too long, either the
    /// login wait or the transport itself.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::LoginTimeout { .. } => true,
            Self::Transport { kind, .. } => kind.is_timeout(),
            _ => false,
        }
    }

    /// Whether the request was rejected for authentication reasons.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::LoginTimeout { .. }
                | Self::LoginFailed { .. }
                | Self::SessionExpired { .. }
                | Self::Transport {
                    kind: TransportFailureKind::Unauthorized,
                    ..
                }
        )
    }
}

/// Classification of URL validation failures in the hyper transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL is missing required scheme (http/https)
    MissingScheme,
}

/// Errors raised inside [`HyperTransport`](crate::HyperTransport).
///
/// These never reach application code directly: the transport folds them into
/// a [`TransportError`](crate::TransportError) whose `err_msg` the response
/// classifier inspects.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Request attempt timed out
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection could not be established (DNS, refused, unreachable)
    #[error("Connection failed: {0}")]
    Connect(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Transport error (protocol, reset, etc)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS error
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Invalid URL (failed to parse)
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// Invalid URL scheme for transport security configuration
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        if err.is_connect() {
            HttpError::Connect(Box::new(err))
        } else {
            HttpError::Transport(Box::new(err))
        }
    }
}

/// Errors raised while assembling a [`Gateway`](crate::Gateway).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BuildError {
    /// Configuration failed validation
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Default hyper transport could not be constructed
    #[error("failed to build transport: {0}")]
    Transport(#[from] HttpError),
}
