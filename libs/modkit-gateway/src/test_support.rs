//! Test doubles shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::platform::AuthModalKind;
use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};
use crate::ui::Ui;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    ShowLoading(String),
    HideLoading,
    Toast(String),
    AuthModal(AuthModalKind),
}

#[derive(Debug, Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
    route: Mutex<Option<String>>,
}

impl RecordingUi {
    pub fn on_route(route: &str) -> Self {
        let ui = Self::default();
        *ui.route.lock() = Some(route.to_owned());
        ui
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&UiEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    pub fn toasts(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                UiEvent::Toast(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Ui for RecordingUi {
    fn show_loading(&self, message: &str) {
        self.events
            .lock()
            .push(UiEvent::ShowLoading(message.to_owned()));
    }

    fn hide_loading(&self) {
        self.events.lock().push(UiEvent::HideLoading);
    }

    fn show_toast(&self, message: &str) {
        self.events.lock().push(UiEvent::Toast(message.to_owned()));
    }

    fn show_auth_modal(&self, kind: AuthModalKind) {
        self.events.lock().push(UiEvent::AuthModal(kind));
    }

    fn current_route(&self) -> Option<String> {
        self.route.lock().clone()
    }
}

/// Transport answering from a queue of canned replies and recording every
/// request it receives.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    fallback: Mutex<Option<TransportResponse>>,
    sent: Mutex<Vec<TransportRequest>>,
    hold: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedTransport {
    pub fn reply_json(&self, status: u16, body: &Value) {
        self.replies.lock().push_back(Ok(json_response(status, body)));
    }

    /// Reply used once the queue is exhausted.
    pub fn fallback_json(&self, status: u16, body: &Value) {
        *self.fallback.lock() = Some(json_response(status, body));
    }

    pub fn reply_error(&self, status_code: Option<u16>, err_msg: &str) {
        self.replies.lock().push_back(Err(TransportError {
            status_code,
            err_msg: err_msg.to_owned(),
        }));
    }

    pub fn sent(&self) -> Vec<TransportRequest> {
        self.sent.lock().clone()
    }

    /// Park every reply until the returned semaphore hands out a permit per
    /// request.
    pub fn hold_replies(&self) -> Arc<Semaphore> {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.hold.lock() = Some(Arc::clone(&semaphore));
        semaphore
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.sent.lock().push(request);
        let hold = self.hold.lock().clone();
        if let Some(semaphore) = hold {
            semaphore.acquire().await.unwrap().forget();
        }
        if let Some(reply) = self.replies.lock().pop_front() {
            return reply;
        }
        match self.fallback.lock().clone() {
            Some(response) => Ok(response),
            None => panic!("no scripted reply left"),
        }
    }
}

fn json_response(status: u16, body: &Value) -> TransportResponse {
    TransportResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: HeaderMap::new(),
        body: Bytes::from(serde_json::to_vec(body).unwrap()),
    }
}
