#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use httpmock::MockServer;
use modkit_gateway::{
    AuthModalKind, CredentialStore, Gateway, GatewayConfig, HyperTransport, MemoryCredentialStore,
    StaticPlatform, Ui,
};
use parking_lot::Mutex;

/// UI that remembers toasts and modals.
#[derive(Debug, Default)]
pub struct CapturingUi {
    pub toasts: Mutex<Vec<String>>,
    pub modals: Mutex<Vec<AuthModalKind>>,
}

impl Ui for CapturingUi {
    fn show_loading(&self, _message: &str) {}

    fn hide_loading(&self) {}

    fn show_toast(&self, message: &str) {
        self.toasts.lock().push(message.to_owned());
    }

    fn show_auth_modal(&self, kind: AuthModalKind) {
        self.modals.lock().push(kind);
    }

    fn current_route(&self) -> Option<String> {
        Some("pages/order/list".to_owned())
    }
}

pub struct TestGateway {
    pub gateway: Gateway,
    pub store: Arc<MemoryCredentialStore>,
    pub ui: Arc<CapturingUi>,
}

/// Gateway talking to `server` over the real hyper transport.
pub fn gateway_for(server: &MockServer, store: MemoryCredentialStore) -> TestGateway {
    gateway_with(server, store, |_| {})
}

pub fn gateway_with(
    server: &MockServer,
    store: MemoryCredentialStore,
    tweak: impl FnOnce(&mut GatewayConfig),
) -> TestGateway {
    let mut config = GatewayConfig {
        api_path: "/app-api/".to_owned(),
        login_timeout: Duration::from_secs(5),
        ..GatewayConfig::for_testing(server.base_url())
    };
    tweak(&mut config);

    let store = Arc::new(store);
    let ui = Arc::new(CapturingUi::default());
    let transport = HyperTransport::from_config(&config).unwrap();

    let gateway = Gateway::builder(config)
        .transport(Arc::new(transport))
        .credential_store(store.clone() as Arc<dyn CredentialStore>)
        .ui(ui.clone())
        .platform(Arc::new(StaticPlatform::new("H5").with_online(true)))
        .build()
        .unwrap();

    TestGateway { gateway, store, ui }
}

/// Yield until `n` requests are parked on the login gate.
pub async fn until_waiters(gateway: &Gateway, n: usize) {
    while gateway.gate().waiter_count() < n {
        tokio::task::yield_now().await;
    }
}
