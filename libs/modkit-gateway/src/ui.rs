use parking_lot::RwLock;

use crate::platform::AuthModalKind;

/// UI collaborator driven by the gateway.
///
/// Calls are fire-and-forget; the gateway never waits on the UI.
pub trait Ui: Send + Sync {
    /// Show the blocking loading overlay.
    fn show_loading(&self, message: &str);

    /// Hide the loading overlay.
    fn hide_loading(&self);

    /// Show a transient message.
    fn show_toast(&self, message: &str);

    /// Present the login modal.
    fn show_auth_modal(&self, kind: AuthModalKind);

    /// Route of the page currently on top of the navigation stack.
    fn current_route(&self) -> Option<String>;
}

/// Headless UI that turns every call into a tracing event.
///
/// Suitable for CLIs and services where there is nothing to render.
#[derive(Debug, Default)]
pub struct TracingUi {
    route: RwLock<Option<String>>,
}

impl TracingUi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the route reported by [`Ui::current_route`].
    pub fn set_route(&self, route: Option<String>) {
        *self.route.write() = route;
    }
}

impl Ui for TracingUi {
    fn show_loading(&self, message: &str) {
        tracing::debug!(message, "loading shown");
    }

    fn hide_loading(&self) {
        tracing::debug!("loading hidden");
    }

    fn show_toast(&self, message: &str) {
        tracing::info!(message, "toast");
    }

    fn show_auth_modal(&self, kind: AuthModalKind) {
        tracing::info!(kind = kind.as_str(), "auth modal requested");
    }

    fn current_route(&self) -> Option<String> {
        self.route.read().clone()
    }
}
