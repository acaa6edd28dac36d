//! Bearer credentials and the token normalizer.
//!
//! The backend does not use one envelope across its authentication endpoints:
//! plain login answers `{ "token": .. }`, session endpoints nest it under
//! `data`, some return the token as the bare `data` payload, and legacy
//! endpoints use `access_token` / `accessToken`. [`TokenNormalizer`] runs an
//! ordered chain of [`TokenExtractor`]s over the decoded body and returns the
//! first hit.

use std::fmt;

use serde_json::Value;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque bearer credential.
///
/// `Debug` and `Display` print `[REDACTED]`; use [`expose`](Self::expose) when
/// building the `Authorization` header. The buffer is zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a raw token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read-only access to the raw token.
    ///
    /// Callers must not log or persist the returned slice outside the
    /// credential store.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// One probe in the normalizer chain.
pub trait TokenExtractor: Send + Sync {
    /// Short label used in trace output.
    fn name(&self) -> &str;

    /// Return the token if this extractor's shape matches `body`.
    fn extract(&self, body: &Value) -> Option<BearerToken>;
}

/// Reads a non-empty string at a JSON pointer, e.g. `/data/token`.
#[derive(Debug, Clone)]
pub struct PointerExtractor {
    pointer: &'static str,
}

impl PointerExtractor {
    #[must_use]
    pub const fn new(pointer: &'static str) -> Self {
        Self { pointer }
    }
}

impl TokenExtractor for PointerExtractor {
    fn name(&self) -> &str {
        self.pointer
    }

    fn extract(&self, body: &Value) -> Option<BearerToken> {
        body.pointer(self.pointer)
            .and_then(Value::as_str)
            .filter(|raw| !raw.is_empty())
            .map(BearerToken::new)
    }
}

/// Treats `body.data` as the token when the server returns it as the bare
/// payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct BareDataExtractor;

impl TokenExtractor for BareDataExtractor {
    fn name(&self) -> &str {
        "/data (bare string)"
    }

    fn extract(&self, body: &Value) -> Option<BearerToken> {
        match body.get("data") {
            Some(Value::String(raw)) if !raw.is_empty() => Some(BearerToken::new(raw.as_str())),
            _ => None,
        }
    }
}

/// Ordered strategy chain extracting a bearer token from a response body.
pub struct TokenNormalizer {
    extractors: Vec<Box<dyn TokenExtractor>>,
}

impl TokenNormalizer {
    /// Build a normalizer from an explicit chain (tried front to back).
    #[must_use]
    pub fn new(extractors: Vec<Box<dyn TokenExtractor>>) -> Self {
        Self { extractors }
    }

    /// Append an extractor to the end of the chain.
    #[must_use]
    pub fn with_extractor(mut self, extractor: impl TokenExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Return the first token found, or `None` when no credential was issued.
    #[must_use]
    pub fn normalize(&self, body: &Value) -> Option<BearerToken> {
        self.extractors.iter().find_map(|extractor| {
            let token = extractor.extract(body)?;
            tracing::trace!(extractor = extractor.name(), "token extracted");
            Some(token)
        })
    }
}

impl Default for TokenNormalizer {
    fn default() -> Self {
        Self::new(vec![
            Box::new(PointerExtractor::new("/token")),
            Box::new(PointerExtractor::new("/data/token")),
            Box::new(BareDataExtractor),
            Box::new(PointerExtractor::new("/data/access_token")),
            Box::new(PointerExtractor::new("/data/accessToken")),
        ])
    }
}

impl fmt::Debug for TokenNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.extractors.iter().map(|e| e.name()))
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize(body: &Value) -> Option<String> {
        TokenNormalizer::default()
            .normalize(body)
            .map(|t| t.expose().to_owned())
    }

    #[test]
    fn bare_data_string() {
        assert_eq!(normalize(&json!({"data": "abc"})), Some("abc".into()));
    }

    #[test]
    fn camel_case_access_token() {
        assert_eq!(
            normalize(&json!({"data": {"accessToken": "xyz"}})),
            Some("xyz".into())
        );
    }

    #[test]
    fn empty_body_yields_none() {
        assert_eq!(normalize(&json!({})), None);
        assert_eq!(normalize(&Value::Null), None);
    }

    #[test]
    fn top_level_token_wins_over_nested() {
        let body = json!({"token": "outer", "data": {"token": "inner"}});
        assert_eq!(normalize(&body), Some("outer".into()));
    }

    #[test]
    fn nested_token_wins_over_access_token() {
        let body = json!({"data": {"token": "t", "access_token": "a", "accessToken": "c"}});
        assert_eq!(normalize(&body), Some("t".into()));

        let body = json!({"data": {"access_token": "a", "accessToken": "c"}});
        assert_eq!(normalize(&body), Some("a".into()));
    }

    #[test]
    fn empty_and_non_string_values_are_skipped() {
        assert_eq!(normalize(&json!({"token": "", "data": "abc"})), Some("abc".into()));
        assert_eq!(normalize(&json!({"token": 42})), None);
        assert_eq!(normalize(&json!({"data": ""})), None);
    }

    #[test]
    fn custom_extractor_appended_last() {
        let normalizer = TokenNormalizer::default().with_extractor(PointerExtractor::new("/jwt"));
        let token = normalizer.normalize(&json!({"jwt": "j"})).unwrap();
        assert_eq!(token.expose(), "j");
    }

    #[test]
    fn token_is_redacted_in_formatting() {
        let token = BearerToken::new("hunter2");
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        assert_eq!(format!("{token}"), "[REDACTED]");
        assert_eq!(token.expose(), "hunter2");
    }
}
