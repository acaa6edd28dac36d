//! The request gateway.
//!
//! [`Gateway::request`] runs every call through the same pipeline:
//!
//! 1. normalize the path against the configured API path;
//! 2. `before_send`: reconcile the session, gate auth-required calls behind
//!    login, attach the token, take part in the loading overlay;
//! 3. send through the [`Transport`];
//! 4. `after_receive`: capture issued tokens, classify the response, release
//!    the overlay, run the classification's side effects.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use zeroize::Zeroizing;

use crate::classifier::{Classification, ResponseClassifier, TransportFailure, server_message};
use crate::config::GatewayConfig;
use crate::error::{BuildError, GatewayError, HttpError};
use crate::gate::{LoginFailure, LoginGate, LoginWaitError};
use crate::loading::{LoadingCounter, LoadingGuard};
use crate::options::RequestOptions;
use crate::platform::{AuthModalKind, Platform, StaticPlatform};
use crate::request::RequestConfig;
use crate::session::{CredentialStore, MemoryCredentialStore, SessionReconciler};
use crate::token::{BearerToken, PointerExtractor, TokenExtractor, TokenNormalizer};
use crate::transport::{
    HyperTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
use crate::ui::{TracingUi, Ui};

/// Header naming the client platform on every request
pub const PLATFORM_HEADER: &str = "platform";

/// Reason reported to gate waiters when the backend rejects the session
const UNAUTHORIZED_REASON: &str = "unauthorized";

/// Where the session-bootstrap endpoints put their token
const BOOTSTRAP_TOKEN: PointerExtractor = PointerExtractor::new("/data/token");

struct GatewayInner {
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    ui: Arc<dyn Ui>,
    platform: Arc<dyn Platform>,
    platform_header: HeaderValue,
    gate: LoginGate,
    loading: Arc<LoadingCounter>,
    normalizer: TokenNormalizer,
    classifier: ResponseClassifier,
    reconciler: SessionReconciler,
}

/// Authenticated request gateway.
///
/// Cheap to clone; clones share the login gate, the loading overlay and all
/// collaborators.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.inner.config.base_url)
            .field("api_path", &self.inner.config.api_path)
            .field("gate", &self.inner.gate)
            .field("loading", &self.inner.loading)
            .finish_non_exhaustive()
    }
}

/// A request that passed `before_send`.
struct Prepared {
    path: String,
    options: RequestOptions,
    request: TransportRequest,
    loading: Option<LoadingGuard>,
}

impl Gateway {
    #[must_use]
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    /// Send `config` through the pipeline.
    ///
    /// Resolves with the response's `data` (or the whole envelope, depending
    /// on [`ResponseShape`](crate::ResponseShape)).
    ///
    /// # Errors
    /// - [`GatewayError::LoginTimeout`] / [`GatewayError::LoginFailed`] if the
    ///   request needed login and none arrived
    /// - [`GatewayError::SessionExpired`] if the backend rejected the session
    /// - [`GatewayError::Business`] for any other non-success business code
    /// - [`GatewayError::Transport`] for HTTP and network failures
    /// - [`GatewayError::InvalidRequest`] if the request could not be built
    pub async fn request(&self, mut config: RequestConfig) -> Result<Value, GatewayError> {
        if let Some(error) = config.error.take() {
            return Err(GatewayError::InvalidRequest(error));
        }

        let path = self.normalize_path(&config.url);
        tracing::debug!(method = %config.method, url = %path, auth = config.custom.auth, "request");

        let prepared = self.before_send(path, config).await?;
        let Prepared {
            path,
            options,
            request,
            loading,
        } = prepared;

        let result = self.inner.transport.send(request).await;
        self.after_receive(&path, &options, loading, result)
    }

    /// [`request`](Self::request), decoding the resolved value into `T`.
    ///
    /// # Errors
    /// Everything [`request`](Self::request) returns, plus
    /// [`GatewayError::Decode`] if the value does not match `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> Result<T, GatewayError> {
        let value = self.request(config).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Report a login completed outside the gateway (e.g. an SDK flow) so
    /// requests waiting on it proceed.
    pub fn notify_login_success(&self) {
        self.inner.gate.notify_success();
    }

    /// Report a login that was abandoned or rejected so requests waiting on
    /// it fail immediately.
    pub fn notify_login_failed(&self, reason: impl Into<String>) {
        self.inner.gate.notify_fail(LoginFailure::new(reason));
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn gate(&self) -> &LoginGate {
        &self.inner.gate
    }

    #[must_use]
    pub fn loading(&self) -> &LoadingCounter {
        &self.inner.loading
    }

    /// Prefix a relative URL with the API path.
    ///
    /// The concatenation is literal: no separator is inserted. URLs starting
    /// with `/` and absolute URLs are left alone.
    #[must_use]
    pub fn normalize_path(&self, url: &str) -> String {
        if url.starts_with('/') || is_absolute(url) {
            url.to_owned()
        } else {
            format!("{}{url}", self.inner.config.api_path)
        }
    }

    /// Join a normalized path onto the base URL.
    #[must_use]
    pub fn resolve_url(&self, path: &str) -> String {
        if is_absolute(path) {
            return path.to_owned();
        }
        format!(
            "{}/{}",
            self.inner.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn before_send(
        &self,
        path: String,
        config: RequestConfig,
    ) -> Result<Prepared, GatewayError> {
        let inner = &self.inner;
        let RequestConfig {
            method,
            mut headers,
            body,
            custom: options,
            ..
        } = config;

        let session = inner.reconciler.snapshot(inner.store.as_ref());
        let mut token = session.token;

        if options.auth && !session.is_login {
            if token.is_some() && inner.config.is_gate_bypass(&path) {
                tracing::debug!(url = %path, "persisted token lets gated endpoint through");
            } else {
                self.await_login(&path).await?;
                token = inner.store.token();
            }
        }

        if let Some(token) = &token {
            headers.insert(AUTHORIZATION, self.authorization(token)?);
        }
        if !headers.contains_key(PLATFORM_HEADER) {
            headers.insert(
                HeaderName::from_static(PLATFORM_HEADER),
                inner.platform_header.clone(),
            );
        }

        let body = body
            .map(|value| serde_json::to_vec(&value).map(Bytes::from))
            .transpose()
            .map_err(|e| GatewayError::InvalidRequest(format!("failed to encode body: {e}")))?;

        let loading = options.show_loading.then(|| {
            let message = if options.loading_msg.is_empty() {
                inner.config.messages.loading.as_str()
            } else {
                options.loading_msg.as_str()
            };
            inner.loading.guard(message)
        });

        let request = TransportRequest {
            method,
            url: self.resolve_url(&path),
            headers,
            body,
        };

        Ok(Prepared {
            path,
            options,
            request,
            loading,
        })
    }

    /// Park until the pending login settles, prompting for it if this call
    /// opened the login cycle.
    async fn await_login(&self, path: &str) -> Result<(), GatewayError> {
        let inner = &self.inner;
        let ticket = inner.gate.subscribe();

        // A login may have completed between the session check and subscribe
        if inner.reconciler.snapshot(inner.store.as_ref()).is_login {
            tracing::debug!(url = %path, "session became available while subscribing");
            return Ok(());
        }

        if ticket.is_leader() {
            let kind = AuthModalKind::for_platform(inner.platform.as_ref());
            tracing::debug!(url = %path, modal = kind.as_str(), "login required; prompting");
            inner.ui.show_auth_modal(kind);
        }

        let timeout = inner.config.login_timeout;
        match ticket.wait(timeout).await {
            Ok(()) => {
                tracing::debug!(url = %path, "login completed; resuming request");
                Ok(())
            }
            Err(LoginWaitError::Timeout(timeout)) => {
                tracing::debug!(url = %path, ?timeout, "abandoning request: login timed out");
                Err(GatewayError::LoginTimeout {
                    timeout,
                    message: inner.config.messages.login_timeout.clone(),
                })
            }
            Err(LoginWaitError::Failed(failure)) => {
                tracing::debug!(url = %path, reason = failure.reason(), "abandoning request: login failed");
                Err(GatewayError::LoginFailed {
                    reason: failure.reason().to_owned(),
                })
            }
        }
    }

    fn authorization(&self, token: &BearerToken) -> Result<HeaderValue, GatewayError> {
        let raw = Zeroizing::new(format!("{}{}", self.inner.config.auth_scheme, token.expose()));
        let mut value = HeaderValue::from_str(&raw).map_err(|_| {
            GatewayError::InvalidRequest("token is not a valid header value".to_owned())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }

    fn after_receive(
        &self,
        path: &str,
        options: &RequestOptions,
        loading: Option<LoadingGuard>,
        result: Result<TransportResponse, TransportError>,
    ) -> Result<Value, GatewayError> {
        let inner = &self.inner;
        let online = inner.platform.is_online();

        let classification = match result {
            Ok(response) if response.status.is_success() => {
                let body = response.json();
                if inner.config.is_auth_issuing(path) {
                    self.capture_token(path, &body);
                } else if inner.config.is_session_bootstrap(path) {
                    self.bootstrap_session(path, &body);
                }
                inner
                    .classifier
                    .classify_body(body, options, inner.store.is_login())
            }
            Ok(response) => {
                let failure = TransportFailure {
                    status: Some(response.status.as_u16()),
                    err_msg: String::new(),
                    server_msg: server_message(&response.json()),
                };
                inner
                    .classifier
                    .classify_transport(&failure, online, inner.store.is_login())
            }
            Err(error) => {
                let failure = TransportFailure {
                    status: error.status_code,
                    err_msg: error.err_msg,
                    server_msg: None,
                };
                inner
                    .classifier
                    .classify_transport(&failure, online, inner.store.is_login())
            }
        };

        drop(loading);

        match classification {
            Classification::Success { value, toast } => {
                if let Some(toast) = toast {
                    inner.ui.show_toast(&toast);
                }
                Ok(value)
            }
            Classification::Unauthorized { message, error } => {
                self.handle_unauthorized(path, &message, options);
                Err(error)
            }
            Classification::Failure { error, toast } => {
                if options.show_error {
                    let text = if options.error_msg.is_empty() {
                        toast.as_str()
                    } else {
                        options.error_msg.as_str()
                    };
                    inner.ui.show_toast(text);
                }
                Err(error)
            }
        }
    }

    /// Persist a token issued by an auth endpoint and wake gated requests.
    fn capture_token(&self, path: &str, body: &Value) {
        let inner = &self.inner;
        let Some(token) = inner.normalizer.normalize(body) else {
            tracing::debug!(url = %path, "auth endpoint response carried no token");
            return;
        };

        if let Err(error) = inner.store.set_token(token) {
            tracing::warn!(url = %path, %error, "failed to persist token; marking session logged in");
            inner.store.mark_logged_in();
        }
        tracing::info!(url = %path, "token captured from auth response");
        inner.gate.notify_success();
    }

    /// Store a session token without waking gated requests.
    fn bootstrap_session(&self, path: &str, body: &Value) {
        let Some(token) = BOOTSTRAP_TOKEN.extract(body) else {
            tracing::warn!(url = %path, "session bootstrap response carried no token");
            return;
        };
        if let Err(error) = self.inner.store.set_token(token) {
            tracing::warn!(url = %path, %error, "failed to persist bootstrap session token");
        }
    }

    fn handle_unauthorized(&self, path: &str, message: &str, options: &RequestOptions) {
        let inner = &self.inner;
        tracing::warn!(url = %path, "session rejected by backend; logging out");

        inner.store.logout(true);
        inner.gate.notify_fail(LoginFailure::new(UNAUTHORIZED_REASON));

        let route = inner.ui.current_route();
        if route
            .as_deref()
            .is_some_and(|r| inner.config.is_landing_route(r))
        {
            tracing::debug!(route = ?route, "on landing route; not prompting for login");
            return;
        }

        if options.show_error {
            inner.ui.show_toast(message);
        }
        inner
            .ui
            .show_auth_modal(AuthModalKind::for_platform(inner.platform.as_ref()));
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// Builder for [`Gateway`].
///
/// Every collaborator has an in-process default: [`HyperTransport`] built from
/// the config, [`MemoryCredentialStore`], [`TracingUi`] and [`StaticPlatform`].
#[must_use = "GatewayBuilder does nothing until .build() is called"]
pub struct GatewayBuilder {
    config: GatewayConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn CredentialStore>>,
    ui: Option<Arc<dyn Ui>>,
    platform: Option<Arc<dyn Platform>>,
    normalizer: Option<TokenNormalizer>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            transport: None,
            store: None,
            ui: None,
            platform: None,
            normalizer: None,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn ui(mut self, ui: Arc<dyn Ui>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Replace the default token extraction chain.
    pub fn token_normalizer(mut self, normalizer: TokenNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Validate the config and assemble the gateway.
    ///
    /// # Errors
    /// Returns [`BuildError::Config`] if the config is invalid and
    /// [`BuildError::Transport`] if the default transport cannot be built or
    /// the platform name is not a valid header value.
    pub fn build(self) -> Result<Gateway, BuildError> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::from_config(&self.config)?),
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));
        let ui = self.ui.unwrap_or_else(|| Arc::new(TracingUi::new()));
        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(StaticPlatform::default()));

        let platform_header =
            HeaderValue::from_str(platform.name()).map_err(HttpError::InvalidHeaderValue)?;

        tracing::debug!(
            base_url = %self.config.base_url,
            api_path = %self.config.api_path,
            platform = platform.name(),
            "gateway built"
        );

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                classifier: ResponseClassifier::from_config(&self.config),
                reconciler: SessionReconciler::new(self.config.reconcile_session),
                normalizer: self.normalizer.unwrap_or_default(),
                loading: Arc::new(LoadingCounter::new(Arc::clone(&ui))),
                gate: LoginGate::new(),
                config: self.config,
                transport,
                store,
                ui,
                platform,
                platform_header,
            }),
        })
    }
}
