use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::TransportFailureKind;
use crate::gate::DEFAULT_LOGIN_TIMEOUT;

/// Default User-Agent string for gateway requests
pub const DEFAULT_USER_AGENT: &str = concat!("modkit-gateway/", env!("CARGO_PKG_VERSION"));

/// Environment variable prefix for configuration overrides.
///
/// Nested keys are separated by `__`, e.g. `MODKIT_GATEWAY__CODES__SUCCESS=0`.
pub const ENV_PREFIX: &str = "MODKIT_GATEWAY__";

/// Default response body limit: 10 mebibytes
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Configuration errors
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Sources could not be merged or deserialized
    #[error("failed to load gateway config: {0}")]
    Load(#[source] Box<figment::Error>),

    /// Configuration is self-inconsistent
    #[error("invalid gateway config: {0}")]
    Invalid(String),
}

/// Transport security mode for the hyper transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportSecurity {
    /// Only `https://` URLs are accepted
    #[default]
    TlsOnly,
    /// Plain `http://` is accepted as well (local backends, mock servers)
    AllowInsecureHttp,
}

/// What a successful business response resolves with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// The `data` member of the envelope (whole body when there is no `data`)
    #[default]
    Data,
    /// The whole `{code, msg, data}` envelope
    Envelope,
}

/// Business status codes carried in the response envelope's `code` member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessCodes {
    pub success: i64,
    pub unauthorized: i64,
    pub server_error: i64,
}

impl Default for BusinessCodes {
    fn default() -> Self {
        Self {
            success: 200,
            unauthorized: 401,
            server_error: 500,
        }
    }
}

/// User-facing strings. Override these to localize the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub loading: String,
    pub session_expired: String,
    pub login_required: String,
    pub login_timeout: String,
    pub server_error_fallback: String,
    pub generic_fallback: String,
    pub bad_request: String,
    pub forbidden: String,
    pub not_found: String,
    pub request_timeout: String,
    pub too_many_requests: String,
    pub server_busy: String,
    pub not_implemented: String,
    pub bad_gateway: String,
    pub service_unavailable: String,
    pub gateway_timeout: String,
    pub http_version_not_supported: String,
    pub server_unreachable: String,
    pub offline: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            loading: "Loading".to_owned(),
            session_expired: "Your session has expired".to_owned(),
            login_required: "Please log in first".to_owned(),
            login_timeout: "Login timed out, please try again".to_owned(),
            server_error_fallback: "Internal server error".to_owned(),
            generic_fallback: "The server is busy, please try again later".to_owned(),
            bad_request: "Bad request".to_owned(),
            forbidden: "Access denied".to_owned(),
            not_found: "Request error".to_owned(),
            request_timeout: "Request timed out".to_owned(),
            too_many_requests: "Too many requests, please try again later".to_owned(),
            server_busy: "The server is busy, please try again later".to_owned(),
            not_implemented: "Service not implemented".to_owned(),
            bad_gateway: "Network error".to_owned(),
            service_unavailable: "Service unavailable".to_owned(),
            gateway_timeout: "Network timed out".to_owned(),
            http_version_not_supported: "HTTP version not supported".to_owned(),
            server_unreachable: "Server error".to_owned(),
            offline: "Please check your network connection".to_owned(),
        }
    }
}

impl Messages {
    /// Message for a transport failure. `Unauthorized` maps to the
    /// login-required text; callers derive the session-aware variant
    /// themselves.
    #[must_use]
    pub fn for_transport(&self, kind: TransportFailureKind) -> &str {
        match kind {
            TransportFailureKind::BadRequest => &self.bad_request,
            TransportFailureKind::Unauthorized => &self.login_required,
            TransportFailureKind::Forbidden => &self.forbidden,
            TransportFailureKind::NotFound => &self.not_found,
            TransportFailureKind::RequestTimeout => &self.request_timeout,
            TransportFailureKind::TooManyRequests => &self.too_many_requests,
            TransportFailureKind::NotImplemented => &self.not_implemented,
            TransportFailureKind::BadGateway => &self.bad_gateway,
            TransportFailureKind::ServiceUnavailable => &self.service_unavailable,
            TransportFailureKind::GatewayTimeout => &self.gateway_timeout,
            TransportFailureKind::HttpVersionNotSupported => &self.http_version_not_supported,
            TransportFailureKind::ServerUnreachable => &self.server_unreachable,
            TransportFailureKind::Offline => &self.offline,
            TransportFailureKind::ServerError | TransportFailureKind::Unknown => &self.server_busy,
        }
    }
}

/// Gateway configuration
///
/// Every field has a default, so a config file only needs to name what it
/// changes. Durations use humantime syntax (`"30s"`, `"1m 30s"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct GatewayConfig {
    /// Backend origin, e.g. `https://shop.example.com/`
    pub base_url: String,

    /// Prefix prepended verbatim to relative request URLs (no separator is
    /// inserted)
    pub api_path: String,

    /// How long a gated request waits for login (default: 30s)
    #[serde(with = "humantime_duration")]
    pub login_timeout: Duration,

    /// Per-request transport timeout (default: 8s)
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    /// User-Agent header value
    pub user_agent: String,

    /// Prefix for the `Authorization` value (empty: raw token)
    pub auth_scheme: String,

    /// What a successful call resolves with
    pub response_shape: ResponseShape,

    /// Business status codes
    pub codes: BusinessCodes,

    /// Endpoints whose responses may carry a freshly issued token
    pub auth_issuing_endpoints: Vec<String>,

    /// Endpoints returning a session token at `data.token` that must be stored
    /// without waking gated requests
    pub session_bootstrap_endpoints: Vec<String>,

    /// Gated endpoints allowed through when a persisted token exists, even if
    /// the login flag has not been restored yet
    pub gate_bypass_endpoints: Vec<String>,

    /// Routes on which a rejected session is handled silently (no toast, no
    /// modal)
    pub landing_routes: Vec<String>,

    /// Promote the login flag from a persisted token before auth gating
    pub reconcile_session: bool,

    /// Transport security mode
    pub transport_security: TransportSecurity,

    /// Maximum response body size in bytes
    pub max_body_size: usize,

    /// User-facing strings
    pub messages: Messages,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_owned(),
            api_path: String::new(),
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            request_timeout: Duration::from_secs(8),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            auth_scheme: String::new(),
            response_shape: ResponseShape::default(),
            codes: BusinessCodes::default(),
            auth_issuing_endpoints: [
                "h5/account/login",
                "h5/sms/login",
                "h5/wechat/login",
                "h5/register",
                "h5/account/register",
                "no-auth/wechat/getWechatUserAuth",
            ]
            .map(str::to_owned)
            .to_vec(),
            session_bootstrap_endpoints: vec!["no-auth/wechat/getSessionId".to_owned()],
            gate_bypass_endpoints: vec!["h5/member/info".to_owned()],
            landing_routes: vec![
                "pages/index/accountIndex".to_owned(),
                "pages/index/index".to_owned(),
            ],
            reconcile_session: true,
            transport_security: TransportSecurity::AllowInsecureHttp,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            messages: Messages::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from defaults, an optional YAML file and
    /// `MODKIT_GATEWAY__*` environment variables (later sources win).
    ///
    /// # Errors
    /// Returns [`ConfigError::Load`] if a source cannot be read or
    /// deserialized and [`ConfigError::Invalid`] if validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }

    /// Extract and validate configuration from a prepared figment.
    ///
    /// # Errors
    /// Returns [`ConfigError::Load`] on extraction failure and
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for self-consistency.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if the base URL is not an absolute
    /// http(s) URL or a timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = url::Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Invalid(format!("base_url '{}' is not a valid URL: {e}", self.base_url))
        })?;
        match base.scheme() {
            "https" => {}
            "http" if self.transport_security == TransportSecurity::AllowInsecureHttp => {}
            "http" => {
                return Err(ConfigError::Invalid(
                    "base_url uses http:// but transport_security is tls_only".to_owned(),
                ));
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "base_url scheme '{other}' is not supported"
                )));
            }
        }
        if self.login_timeout.is_zero() {
            return Err(ConfigError::Invalid("login_timeout must be > 0".to_owned()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be > 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Config for tests: plain HTTP against `base_url`, short timeouts.
    #[must_use]
    pub fn for_testing(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            transport_security: TransportSecurity::AllowInsecureHttp,
            ..Self::default()
        }
    }

    pub(crate) fn is_auth_issuing(&self, url: &str) -> bool {
        matches_any(&self.auth_issuing_endpoints, url)
    }

    pub(crate) fn is_session_bootstrap(&self, url: &str) -> bool {
        matches_any(&self.session_bootstrap_endpoints, url)
    }

    pub(crate) fn is_gate_bypass(&self, url: &str) -> bool {
        matches_any(&self.gate_bypass_endpoints, url)
    }

    pub(crate) fn is_landing_route(&self, route: &str) -> bool {
        self.landing_routes.iter().any(|r| r == route)
    }
}

fn matches_any(patterns: &[String], url: &str) -> bool {
    patterns.iter().any(|p| url.contains(p.as_str()))
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}
