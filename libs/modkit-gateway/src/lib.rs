#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Authenticated request gateway for `ModKit`
//!
//! Sits between application code and an HTTP [`Transport`] and:
//! - attaches the session token to every request
//! - parks requests that need login until the in-flight login settles,
//!   instead of failing them
//! - captures tokens issued by login endpoints and wakes the parked requests
//! - folds the backend's `{code, msg, data}` envelope and HTTP failures into
//!   one [`GatewayError`] taxonomy, with toasts, logout and login prompts as
//!   side effects
//! - reference-counts the loading overlay across concurrent requests
//!
//! # Example
//!
//! ```ignore
//! use modkit_gateway::{Gateway, GatewayConfig, RequestConfig};
//! use serde_json::json;
//!
//! let gateway = Gateway::builder(GatewayConfig::load(None)?).build()?;
//!
//! // Waits for login (showing the login modal once) if nobody is logged in
//! let orders = gateway
//!     .request(RequestConfig::get("h5/order/list").query(&[("page", 1)]).auth())
//!     .await?;
//!
//! // Tokens from login endpoints are captured automatically
//! gateway
//!     .request(RequestConfig::post("h5/sms/login").json(json!({ "mobile": "...", "code": "..." })))
//!     .await?;
//! ```

mod classifier;
mod config;
mod error;
mod gate;
mod gateway;
mod layers;
mod loading;
mod options;
mod platform;
mod request;
mod session;
mod token;
mod transport;
mod ui;

#[cfg(test)]
mod test_support;

pub use classifier::{Classification, ResponseClassifier, TransportFailure};
pub use config::{
    BusinessCodes, ConfigError, DEFAULT_MAX_BODY_SIZE, DEFAULT_USER_AGENT, ENV_PREFIX,
    GatewayConfig, Messages, ResponseShape, TransportSecurity,
};
pub use error::{BuildError, GatewayError, HttpError, InvalidUriKind, TransportFailureKind};
pub use gate::{DEFAULT_LOGIN_TIMEOUT, LoginFailure, LoginGate, LoginTicket, LoginWaitError};
pub use gateway::{Gateway, GatewayBuilder, PLATFORM_HEADER};
pub use layers::{DEFAULT_ACCEPT, DEFAULT_CONTENT_TYPE, DefaultHeadersLayer, DefaultHeadersService};
pub use loading::{LoadingCounter, LoadingGuard};
pub use options::RequestOptions;
pub use platform::{AuthModalKind, Platform, StaticPlatform, WECHAT_MINI_PROGRAM};
pub use request::RequestConfig;
pub use session::{
    CredentialStore, MemoryCredentialStore, SessionError, SessionReconciler, SessionSnapshot,
};
pub use token::{BareDataExtractor, BearerToken, PointerExtractor, TokenExtractor, TokenNormalizer};
pub use transport::{
    HyperTransport, HyperTransportBuilder, Transport, TransportError, TransportRequest,
    TransportResponse,
};
pub use ui::{TracingUi, Ui};
