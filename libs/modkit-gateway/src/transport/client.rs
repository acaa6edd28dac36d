use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use parking_lot::Mutex;
use tokio::time::Instant;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneService;
use tower::{ServiceBuilder, ServiceExt};

use super::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::config::{DEFAULT_MAX_BODY_SIZE, DEFAULT_USER_AGENT, GatewayConfig, TransportSecurity};
use crate::error::{HttpError, InvalidUriKind};
use crate::layers::DefaultHeadersLayer;

type HyperService = BoxCloneService<http::Request<Full<Bytes>>, Response<Incoming>, HttpError>;

/// [`Transport`] over a pooled hyper client with rustls.
///
/// Request flow: `Timeout → DefaultHeaders → hyper client`. Every HTTP status
/// comes back as a response; only failures to get one at all become
/// [`TransportError`]s.
///
/// The timeout covers the whole exchange: reading the body gets whatever is
/// left of it after the response head arrived.
#[derive(Clone)]
pub struct HyperTransport {
    service: Arc<Mutex<HyperService>>,
    timeout: Duration,
    max_body_size: usize,
    transport_security: TransportSecurity,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("timeout", &self.timeout)
            .field("max_body_size", &self.max_body_size)
            .field("transport_security", &self.transport_security)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    #[must_use]
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// Transport configured from the gateway's timeout, user agent, transport
    /// security and body limit.
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails or the user agent is not
    /// a valid header value
    pub fn from_config(config: &GatewayConfig) -> Result<Self, HttpError> {
        HyperTransportBuilder::new()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .transport_security(config.transport_security)
            .max_body_size(config.max_body_size)
            .build()
    }

    fn validate_url(&self, url: &str) -> Result<http::Uri, HttpError> {
        let uri: http::Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                url: url.to_owned(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            })?;

        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: url.to_owned(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host/authority".to_owned(),
            });
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") => match self.transport_security {
                TransportSecurity::AllowInsecureHttp => Ok(uri),
                TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            Some(scheme) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            None => Err(HttpError::InvalidUri {
                url: url.to_owned(),
                kind: InvalidUriKind::MissingScheme,
                reason: "missing scheme".to_owned(),
            }),
        }
    }

    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, HttpError> {
        let uri = self.validate_url(&request.url)?;

        let mut req = http::Request::builder()
            .method(request.method)
            .uri(uri)
            .body(Full::new(request.body.unwrap_or_default()))?;
        req.headers_mut().extend(request.headers);

        let started = Instant::now();

        // BoxCloneService is not Sync; clone it out of the lock per call
        let service = self.service.lock().clone();
        let response = service.oneshot(req).await?;

        let (parts, body) = response.into_parts();
        let remaining = self.timeout.saturating_sub(started.elapsed());
        let body = tokio::time::timeout(remaining, read_body_limited(body, self.max_body_size))
            .await
            .map_err(|_| HttpError::Timeout(self.timeout))??;

        Ok(TransportResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let method = request.method.clone();
        let url = request.url.clone();
        match self.execute(request).await {
            Ok(response) => {
                tracing::debug!(%method, %url, status = response.status.as_u16(), "response received");
                Ok(response)
            }
            Err(err) => {
                tracing::debug!(%method, %url, error = %err, "request failed");
                Err(err.into())
            }
        }
    }
}

/// Builder for [`HyperTransport`]
#[derive(Debug, Clone)]
pub struct HyperTransportBuilder {
    timeout: Duration,
    user_agent: String,
    transport_security: TransportSecurity,
    max_body_size: usize,
}

impl HyperTransportBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport_security: TransportSecurity::TlsOnly,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set transport security mode
    ///
    /// Use `TransportSecurity::AllowInsecureHttp` only for local backends and
    /// mock servers.
    #[must_use]
    pub fn transport_security(mut self, transport_security: TransportSecurity) -> Self {
        self.transport_security = transport_security;
        self
    }

    /// Set the maximum response body size
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Build the transport
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails or the user agent is not
    /// a valid header value
    pub fn build(self) -> Result<HyperTransport, HttpError> {
        if self.transport_security == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 traffic will not be encrypted"
            );
        }

        let timeout = self.timeout;
        let https = build_https_connector(self.transport_security)?;

        let mut client_builder = Client::builder(TokioExecutor::new());
        client_builder.pool_timer(TokioTimer::new()).http2_only(false);
        let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

        let headers_layer = DefaultHeadersLayer::try_new(&self.user_agent)?;

        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(headers_layer)
            .service(hyper_client)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout))
            .boxed_clone();

        Ok(HyperTransport {
            service: Arc::new(Mutex::new(service)),
            timeout,
            max_body_size: self.max_body_size,
            transport_security: self.transport_security,
        })
    }
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Map tower errors to `HttpError` with the actual timeout duration
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(timeout);
    }

    match err.downcast::<hyper_util::client::legacy::Error>() {
        Ok(client_err) => HttpError::from(*client_err),
        Err(other) => HttpError::Transport(other),
    }
}

async fn read_body_limited(body: Incoming, limit: usize) -> Result<Bytes, HttpError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(HttpError::BodyTooLarge { limit }),
        Err(err) => Err(HttpError::Transport(err)),
    }
}

/// HTTPS connector with webpki roots; ALPN advertises both h2 and http/1.1.
fn build_https_connector(
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let provider = rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    let builder = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(provider)
        .map_err(|e| HttpError::Tls(Box::new(e)))?;

    let connector = match transport {
        TransportSecurity::AllowInsecureHttp => {
            builder.https_or_http().enable_all_versions().build()
        }
        TransportSecurity::TlsOnly => builder.https_only().enable_all_versions().build(),
    };
    Ok(connector)
}
