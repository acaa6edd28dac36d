use crate::error::HttpError;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// `Accept` value sent with every gateway request
pub const DEFAULT_ACCEPT: &str = "application/json";

/// `Content-Type` value sent with every gateway request
pub const DEFAULT_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Tower layer that fills in default headers the caller did not set
#[derive(Clone, Debug)]
pub struct DefaultHeadersLayer {
    defaults: HeaderMap,
}

impl DefaultHeadersLayer {
    /// Layer carrying the JSON `Accept`/`Content-Type` pair and `user_agent`.
    ///
    /// # Errors
    /// Returns `HttpError::InvalidHeaderValue` if the user agent string is not valid
    pub fn try_new(user_agent: impl AsRef<str>) -> Result<Self, HttpError> {
        let mut defaults = HeaderMap::new();
        defaults.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        defaults.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        defaults.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent.as_ref()).map_err(HttpError::InvalidHeaderValue)?,
        );
        Ok(Self { defaults })
    }

    /// Add another default header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.defaults.insert(name, value);
        self
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            defaults: self.defaults.clone(),
        }
    }
}

/// Service that fills in default headers
#[derive(Clone, Debug)]
pub struct DefaultHeadersService<S> {
    inner: S,
    defaults: HeaderMap,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DefaultHeadersService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // Caller-supplied headers win
        for (name, value) in &self.defaults {
            if !req.headers().contains_key(name) {
                req.headers_mut().insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, Request, Response, StatusCode};
    use http_body_util::Full;
    use tower::ServiceExt;

    /// Test service that asserts a header matches the expected value.
    #[derive(Clone)]
    struct CheckHeaderService {
        name: HeaderName,
        expected: HeaderValue,
    }

    impl Service<Request<Full<Bytes>>> for CheckHeaderService {
        type Response = Response<Full<Bytes>>;
        type Error = Box<dyn std::error::Error + Send + Sync>;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            assert_eq!(req.headers().get(&self.name), Some(&self.expected));
            std::future::ready(Ok(Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::new()))
                .unwrap()))
        }
    }

    fn request() -> http::request::Builder {
        Request::builder().method(Method::POST).uri("http://example.com")
    }

    #[tokio::test]
    async fn test_defaults_added() {
        let layer = DefaultHeadersLayer::try_new("test-agent/1.0").unwrap();

        for (name, expected) in [
            (ACCEPT, DEFAULT_ACCEPT),
            (CONTENT_TYPE, DEFAULT_CONTENT_TYPE),
            (USER_AGENT, "test-agent/1.0"),
        ] {
            let service = layer.layer(CheckHeaderService {
                name,
                expected: HeaderValue::from_static(expected),
            });
            let req = request().body(Full::new(Bytes::new())).unwrap();
            service.oneshot(req).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_caller_headers_not_overwritten() {
        let service = DefaultHeadersLayer::try_new("test-agent/1.0")
            .unwrap()
            .layer(CheckHeaderService {
                name: CONTENT_TYPE,
                expected: HeaderValue::from_static("text/plain"),
            });

        let req = request()
            .header(CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::new()))
            .unwrap();
        service.oneshot(req).await.unwrap();
    }

    #[tokio::test]
    async fn test_extra_default_header() {
        let service = DefaultHeadersLayer::try_new("test-agent/1.0")
            .unwrap()
            .with_header(
                HeaderName::from_static("platform"),
                HeaderValue::from_static("H5"),
            )
            .layer(CheckHeaderService {
                name: HeaderName::from_static("platform"),
                expected: HeaderValue::from_static("H5"),
            });

        let req = request().body(Full::new(Bytes::new())).unwrap();
        service.oneshot(req).await.unwrap();
    }

    #[test]
    fn test_invalid_user_agent() {
        // Control characters are invalid in header values
        let result = DefaultHeadersLayer::try_new("invalid\x00agent");
        assert!(result.is_err());
    }
}
