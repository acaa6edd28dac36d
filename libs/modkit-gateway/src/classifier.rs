//! Response classification.
//!
//! Turns whatever came back from the transport into one [`Classification`].
//! The classifier itself is pure; the gateway carries out the side effects a
//! classification asks for (toasts, logout, login-modal, waking the gate).

use serde_json::Value;

use crate::config::{BusinessCodes, GatewayConfig, Messages, ResponseShape};
use crate::error::{GatewayError, TransportFailureKind};
use crate::options::RequestOptions;

/// A request that produced no usable business envelope: either no response at
/// all or a non-2xx HTTP status.
#[derive(Debug, Clone, Default)]
pub struct TransportFailure {
    pub status: Option<u16>,
    /// Transport's own error text (empty for non-2xx responses)
    pub err_msg: String,
    /// `msg` from the response body, when there was one
    pub server_msg: Option<String>,
}

/// Outcome of classifying one response.
#[derive(Debug)]
pub enum Classification {
    /// Resolve with `value`; toast `toast` if set
    Success { value: Value, toast: Option<String> },

    /// Session rejected by the backend: invalidate it, fail pending logins,
    /// prompt for login, then reject with `error`
    Unauthorized { message: String, error: GatewayError },

    /// Reject with `error`; `toast` is the text to show when errors are shown
    Failure { error: GatewayError, toast: String },
}

/// Maps responses and transport errors onto [`Classification`]s.
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    codes: BusinessCodes,
    shape: ResponseShape,
    messages: Messages,
}

impl ResponseClassifier {
    #[must_use]
    pub fn new(codes: BusinessCodes, shape: ResponseShape, messages: Messages) -> Self {
        Self {
            codes,
            shape,
            messages,
        }
    }

    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.codes,
            config.response_shape,
            config.messages.clone(),
        )
    }

    /// Message for a rejected session, depending on whether the user was
    /// logged in when the rejection arrived.
    #[must_use]
    pub fn unauthorized_message(&self, was_logged_in: bool) -> &str {
        if was_logged_in {
            &self.messages.session_expired
        } else {
            &self.messages.login_required
        }
    }

    /// Classify a 2xx response body.
    ///
    /// A missing, empty or zero `code` counts as success, as does a body that
    /// is not a JSON object at all. A `code` that is present but not an
    /// integer is a business error.
    #[must_use]
    pub fn classify_body(
        &self,
        body: Value,
        options: &RequestOptions,
        was_logged_in: bool,
    ) -> Classification {
        let code = match business_code(&body) {
            BusinessCode::Absent | BusinessCode::Numeric(0) => return self.success(body, options),
            BusinessCode::Numeric(code) => Some(code),
            BusinessCode::Unrecognized => None,
        };

        match code {
            Some(code) if code == self.codes.success => self.success(body, options),
            Some(code) if code == self.codes.unauthorized => {
                let message = self.unauthorized_message(was_logged_in).to_owned();
                tracing::debug!(code, "business response rejected the session");
                Classification::Unauthorized {
                    error: GatewayError::SessionExpired {
                        message: message.clone(),
                    },
                    message,
                }
            }
            code => {
                let fallback = if code == Some(self.codes.server_error) {
                    &self.messages.server_error_fallback
                } else {
                    &self.messages.generic_fallback
                };
                let message = server_message(&body).unwrap_or_else(|| fallback.clone());
                tracing::debug!(?code, %message, "business error");
                Classification::Failure {
                    toast: message.clone(),
                    error: GatewayError::Business { code, message },
                }
            }
        }
    }

    /// Classify a request that failed below the business layer.
    ///
    /// `online` is the platform's connectivity signal; `None` leaves network
    /// failures unrefined.
    #[must_use]
    pub fn classify_transport(
        &self,
        failure: &TransportFailure,
        online: Option<bool>,
        was_logged_in: bool,
    ) -> Classification {
        let kind = refine_kind(
            TransportFailureKind::from_status(failure.status),
            &failure.err_msg,
            online,
        );

        if kind == TransportFailureKind::Unauthorized {
            let message = self.unauthorized_message(was_logged_in).to_owned();
            return Classification::Unauthorized {
                error: GatewayError::Transport {
                    kind,
                    status: failure.status,
                    message: message.clone(),
                },
                message,
            };
        }

        let message = self.messages.for_transport(kind).to_owned();
        tracing::debug!(
            status = ?failure.status,
            err_msg = %failure.err_msg,
            ?kind,
            "transport failure"
        );
        Classification::Failure {
            toast: failure
                .server_msg
                .clone()
                .unwrap_or_else(|| message.clone()),
            error: GatewayError::Transport {
                kind,
                status: failure.status,
                message,
            },
        }
    }

    fn success(&self, body: Value, options: &RequestOptions) -> Classification {
        let toast = (options.show_success && !options.success_msg.is_empty())
            .then(|| options.success_msg.clone());

        let value = match self.shape {
            ResponseShape::Envelope => body,
            ResponseShape::Data => match body {
                Value::Object(mut map) if map.contains_key("data") => {
                    map.remove("data").unwrap_or(Value::Null)
                }
                other => other,
            },
        };
        Classification::Success { value, toast }
    }
}

/// Refine a status-derived kind with the transport's error text.
fn refine_kind(
    kind: TransportFailureKind,
    err_msg: &str,
    online: Option<bool>,
) -> TransportFailureKind {
    if err_msg.contains("timeout") {
        return TransportFailureKind::RequestTimeout;
    }
    if err_msg.contains("Network") {
        return match online {
            Some(true) => TransportFailureKind::ServerUnreachable,
            Some(false) => TransportFailureKind::Offline,
            None => kind,
        };
    }
    kind
}

/// What the envelope's `code` member holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusinessCode {
    /// Missing, `null`, `false` or an empty string
    Absent,
    Numeric(i64),
    /// Present but not an integer (`"FAIL"`, `1.5`, `true`, objects, ...)
    Unrecognized,
}

/// Read `code`; numeric strings and integral floats are accepted.
fn business_code(body: &Value) -> BusinessCode {
    let numeric = match body.get("code") {
        None | Some(Value::Null | Value::Bool(false)) => return BusinessCode::Absent,
        Some(Value::String(s)) if s.trim().is_empty() => return BusinessCode::Absent,
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        Some(_) => None,
    };
    numeric.map_or(BusinessCode::Unrecognized, BusinessCode::Numeric)
}

/// `value` as an `i64` when it has no fractional part and fits.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(value: f64) -> Option<i64> {
    let fits = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && fits).then(|| value as i64)
}

/// Non-empty `msg` from a response body.
pub(crate) fn server_message(body: &Value) -> Option<String> {
    body.get("msg")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn classifier() -> ResponseClassifier {
        ResponseClassifier::from_config(&GatewayConfig::default())
    }

    fn options() -> RequestOptions {
        RequestOptions::default()
    }

    #[test]
    fn success_resolves_with_data() {
        let result = classifier().classify_body(json!({"code": 200, "data": {"id": 1}}), &options(), true);
        match result {
            Classification::Success { value, toast } => {
                assert_eq!(value, json!({"id": 1}));
                assert!(toast.is_none());
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn envelope_shape_keeps_whole_body() {
        let classifier = ResponseClassifier::new(
            BusinessCodes::default(),
            ResponseShape::Envelope,
            Messages::default(),
        );
        let body = json!({"code": 200, "msg": "ok", "data": [1]});
        match classifier.classify_body(body.clone(), &options(), false) {
            Classification::Success { value, .. } => assert_eq!(value, body),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn missing_or_zero_code_is_success() {
        for body in [json!({"data": 5}), json!({"code": 0, "data": 5})] {
            match classifier().classify_body(body, &options(), false) {
                Classification::Success { value, .. } => assert_eq!(value, json!(5)),
                other => panic!("expected success, got {other:?}"),
            }
        }

        match classifier().classify_body(json!("plain"), &options(), false) {
            Classification::Success { value, .. } => assert_eq!(value, json!("plain")),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn success_toast_needs_flag_and_message() {
        let with_msg = options().success("Saved");
        match classifier().classify_body(json!({"code": 200}), &with_msg, false) {
            Classification::Success { toast, .. } => assert_eq!(toast.as_deref(), Some("Saved")),
            other => panic!("expected success, got {other:?}"),
        }

        let mut flag_only = options();
        flag_only.show_success = true;
        match classifier().classify_body(json!({"code": 200}), &flag_only, false) {
            Classification::Success { toast, .. } => assert!(toast.is_none()),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn unauthorized_message_depends_on_session() {
        let body = json!({"code": 401, "msg": "token invalid"});

        match classifier().classify_body(body.clone(), &options(), true) {
            Classification::Unauthorized { message, error } => {
                assert_eq!(message, "Your session has expired");
                assert!(matches!(error, GatewayError::SessionExpired { .. }));
            }
            other => panic!("expected unauthorized, got {other:?}"),
        }

        match classifier().classify_body(body, &options(), false) {
            Classification::Unauthorized { message, .. } => {
                assert_eq!(message, "Please log in first");
            }
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn server_error_uses_server_message_or_fallback() {
        match classifier().classify_body(json!({"code": 500, "msg": "db down"}), &options(), true) {
            Classification::Failure { error, toast } => {
                assert_eq!(toast, "db down");
                assert!(matches!(error, GatewayError::Business { code: Some(500), .. }));
            }
            other => panic!("expected failure, got {other:?}"),
        }

        match classifier().classify_body(json!({"code": 500}), &options(), true) {
            Classification::Failure { error, .. } => {
                assert_eq!(error.to_string(), "Internal server error");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn other_codes_fall_back_to_generic_text() {
        match classifier().classify_body(json!({"code": "1002"}), &options(), true) {
            Classification::Failure { error, .. } => {
                assert!(matches!(error, GatewayError::Business { code: Some(1002), .. }));
                assert_eq!(error.to_string(), "The server is busy, please try again later");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_code_is_a_business_error() {
        match classifier().classify_body(json!({"code": "FAIL", "msg": "stock gone"}), &options(), true) {
            Classification::Failure { error, toast } => {
                assert_eq!(toast, "stock gone");
                assert!(matches!(error, GatewayError::Business { code: None, .. }));
            }
            other => panic!("expected failure, got {other:?}"),
        }

        for body in [json!({"code": 1.5}), json!({"code": true}), json!({"code": u64::MAX})] {
            match classifier().classify_body(body, &options(), true) {
                Classification::Failure { error, .. } => {
                    assert!(matches!(error, GatewayError::Business { code: None, .. }));
                    assert_eq!(error.to_string(), "The server is busy, please try again later");
                }
                other => panic!("expected failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn integral_float_codes_are_recognized() {
        match classifier().classify_body(json!({"code": 401.0, "msg": "x"}), &options(), true) {
            Classification::Unauthorized { error, .. } => {
                assert!(matches!(error, GatewayError::SessionExpired { .. }));
            }
            other => panic!("expected unauthorized, got {other:?}"),
        }

        match classifier().classify_body(json!({"code": "200.0", "data": 1}), &options(), true) {
            Classification::Success { value, .. } => assert_eq!(value, json!(1)),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn falsy_codes_count_as_absent() {
        for body in [json!({"code": null, "data": 2}), json!({"code": "", "data": 2}), json!({"code": false, "data": 2})] {
            match classifier().classify_body(body, &options(), true) {
                Classification::Success { value, .. } => assert_eq!(value, json!(2)),
                other => panic!("expected success, got {other:?}"),
            }
        }
    }

    #[test]
    fn gateway_timeout_status_maps_to_timeout_message() {
        let failure = TransportFailure {
            status: Some(504),
            ..TransportFailure::default()
        };
        match classifier().classify_transport(&failure, None, true) {
            Classification::Failure { error, toast } => {
                assert!(error.is_timeout());
                assert_eq!(toast, "Network timed out");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn error_text_refines_the_status() {
        let timeout = TransportFailure {
            err_msg: "request:fail timeout".into(),
            ..TransportFailure::default()
        };
        match classifier().classify_transport(&timeout, None, false) {
            Classification::Failure { error, .. } => assert_eq!(error.to_string(), "Request timed out"),
            other => panic!("expected failure, got {other:?}"),
        }

        let network = TransportFailure {
            err_msg: "request:fail Network Error".into(),
            ..TransportFailure::default()
        };
        let message = |online| match classifier().classify_transport(&network, online, false) {
            Classification::Failure { error, .. } => error.to_string(),
            other => panic!("expected failure, got {other:?}"),
        };
        assert_eq!(message(Some(true)), "Server error");
        assert_eq!(message(Some(false)), "Please check your network connection");
        assert_eq!(message(None), "The server is busy, please try again later");
    }

    #[test]
    fn transport_toast_prefers_server_message() {
        let failure = TransportFailure {
            status: Some(403),
            server_msg: Some("member level too low".into()),
            ..TransportFailure::default()
        };
        match classifier().classify_transport(&failure, None, true) {
            Classification::Failure { error, toast } => {
                assert_eq!(toast, "member level too low");
                assert_eq!(error.to_string(), "Access denied");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn transport_401_takes_the_unauthorized_path() {
        let failure = TransportFailure {
            status: Some(401),
            ..TransportFailure::default()
        };
        match classifier().classify_transport(&failure, None, true) {
            Classification::Unauthorized { message, error } => {
                assert_eq!(message, "Your session has expired");
                assert!(error.is_auth_failure());
            }
            other => panic!("expected unauthorized, got {other:?}"),
        }
    }
}
