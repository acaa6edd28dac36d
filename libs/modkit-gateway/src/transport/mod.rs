//! Transport contract the gateway sends through.
//!
//! The gateway never touches the network itself. Anything implementing
//! [`Transport`] can carry its requests; [`HyperTransport`] is the default.

mod client;

pub use self::client::{HyperTransport, HyperTransportBuilder};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::error::HttpError;

/// Fully resolved request handed to the transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Absolute URL
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Response as received from the transport, whatever its status.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    /// Decode the body as JSON.
    ///
    /// An empty body decodes to `Null`; a body that is not JSON is returned
    /// as a JSON string so the classifier can still inspect it.
    #[must_use]
    pub fn json(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }
}

/// Request that produced no response.
///
/// `err_msg` is the transport's own description of the failure; the
/// classifier looks for `timeout` and `Network` in it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{err_msg}")]
pub struct TransportError {
    pub status_code: Option<u16>,
    pub err_msg: String,
}

impl TransportError {
    pub fn new(status_code: Option<u16>, err_msg: impl Into<String>) -> Self {
        Self {
            status_code,
            err_msg: err_msg.into(),
        }
    }
}

impl From<HttpError> for TransportError {
    fn from(err: HttpError) -> Self {
        let err_msg = match &err {
            HttpError::Timeout(_) => "request:fail timeout".to_owned(),
            HttpError::Connect(_) => "request:fail Network Error".to_owned(),
            other => format!("request:fail {other}"),
        };
        tracing::debug!(error = %err, %err_msg, "transport request failed");
        Self {
            status_code: None,
            err_msg,
        }
    }
}

/// Carries gateway requests to the backend.
///
/// Implementations return `Ok` for every HTTP status and `Err` only when no
/// response was received at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
