use serde::{Deserialize, Serialize};

/// Per-request behaviour switches.
///
/// Field names serialize in camelCase (`showError`, `loadingMsg`, ...) so
/// options can be passed through from JSON call sites unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct RequestOptions {
    /// Toast `success_msg` when the call succeeds
    pub show_success: bool,
    pub success_msg: String,
    /// Toast the failure message when the call fails
    pub show_error: bool,
    /// Replaces the toast text (not the rejection message) on failure
    pub error_msg: String,
    /// Take part in the shared loading overlay
    pub show_loading: bool,
    /// Overlay text; empty uses the configured default
    pub loading_msg: String,
    /// Gate the request behind login
    pub auth: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            show_success: false,
            success_msg: String::new(),
            show_error: true,
            error_msg: String::new(),
            show_loading: true,
            loading_msg: String::new(),
            auth: false,
        }
    }
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require login before sending.
    #[must_use]
    pub fn auth(mut self, auth: bool) -> Self {
        self.auth = auth;
        self
    }

    /// Toast `message` on success.
    #[must_use]
    pub fn success(mut self, message: impl Into<String>) -> Self {
        self.show_success = true;
        self.success_msg = message.into();
        self
    }

    #[must_use]
    pub fn show_error(mut self, show: bool) -> Self {
        self.show_error = show;
        self
    }

    /// Toast `message` instead of the derived failure text.
    #[must_use]
    pub fn error_msg(mut self, message: impl Into<String>) -> Self {
        self.error_msg = message.into();
        self
    }

    #[must_use]
    pub fn show_loading(mut self, show: bool) -> Self {
        self.show_loading = show;
        self
    }

    #[must_use]
    pub fn loading_msg(mut self, message: impl Into<String>) -> Self {
        self.loading_msg = message.into();
        self
    }

    /// Neither loading overlay nor error toast.
    #[must_use]
    pub fn silent(self) -> Self {
        self.show_loading(false).show_error(false)
    }
}
