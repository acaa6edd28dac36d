use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;

use crate::options::RequestOptions;

/// A call as application code describes it.
///
/// `url` is relative to the configured API path unless it starts with `/`
/// or is absolute.
///
/// # Example
///
/// ```ignore
/// let cart = gateway
///     .request(
///         RequestConfig::post("h5/cart/add")
///             .json(json!({ "skuId": 7, "count": 1 }))
///             .auth(),
///     )
///     .await?;
/// ```
#[derive(Debug, Clone)]
#[must_use = "RequestConfig does nothing until passed to Gateway::request"]
pub struct RequestConfig {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub custom: RequestOptions,
    /// Error captured during building (reported by `Gateway::request`)
    pub(crate) error: Option<String>,
}

impl RequestConfig {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
            body: None,
            custom: RequestOptions::default(),
            error: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Add a single header. An invalid name or value fails the request.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(e), _) => self.error = Some(format!("invalid header name '{name}': {e}")),
            (_, Err(e)) => self.error = Some(format!("invalid header value for '{name}': {e}")),
        }
        self
    }

    /// Append URL-encoded query parameters.
    pub fn query<T: Serialize + ?Sized>(mut self, params: &T) -> Self {
        if self.error.is_some() {
            return self;
        }

        match serde_urlencoded::to_string(params) {
            Ok(query) if query.is_empty() => {}
            Ok(query) => {
                let separator = if self.url.contains('?') { '&' } else { '?' };
                self.url.push(separator);
                self.url.push_str(&query);
            }
            Err(e) => self.error = Some(format!("failed to encode query: {e}")),
        }
        self
    }

    /// Set a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON body.
    pub fn json_from<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.body = Some(value),
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(format!("failed to encode body: {e}"));
                }
            }
        }
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.custom = options;
        self
    }

    /// Shorthand for requiring login.
    pub fn auth(mut self) -> Self {
        self.custom.auth = true;
        self
    }
}
