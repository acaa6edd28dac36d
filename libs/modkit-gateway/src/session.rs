//! Credential store contract and session reconciliation.

use parking_lot::RwLock;
use thiserror::Error;

use crate::token::BearerToken;

/// Failure reported by a [`CredentialStore`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// Token could not be written to persistent storage
    #[error("failed to persist token: {0}")]
    Persist(String),
}

/// Persistent session owned by the host application.
///
/// The store keeps two pieces of state that can drift apart: the persisted
/// token (survives restarts) and the in-memory login flag (does not).
pub trait CredentialStore: Send + Sync {
    /// Persisted token, if any.
    fn token(&self) -> Option<BearerToken>;

    /// In-memory login flag.
    fn is_login(&self) -> bool;

    /// Persist `token` and flip the login flag.
    ///
    /// # Errors
    /// Returns [`SessionError::Persist`] if the token cannot be stored.
    fn set_token(&self, token: BearerToken) -> Result<(), SessionError>;

    /// Flip the login flag without touching the persisted token.
    fn mark_logged_in(&self);

    /// Clear the session. `silent` suppresses the store's own navigation side
    /// effects (redirects after logout).
    fn logout(&self, silent: bool);
}

/// Session state as seen by one request.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub is_login: bool,
    pub token: Option<BearerToken>,
}

/// Reads the session, repairing the "token persisted but flag not restored"
/// skew left behind by a process restart.
#[derive(Debug, Clone, Copy)]
pub struct SessionReconciler {
    enabled: bool,
}

impl SessionReconciler {
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Read the current session, promoting the login flag when a persisted
    /// token exists and reconciliation is enabled.
    #[must_use]
    pub fn snapshot(&self, store: &dyn CredentialStore) -> SessionSnapshot {
        let token = store.token();
        let mut is_login = store.is_login();

        if self.enabled && token.is_some() && !is_login {
            tracing::debug!("persisted token found without login flag; restoring session");
            store.mark_logged_in();
            is_login = true;
        }

        SessionSnapshot { is_login, token }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    token: Option<BearerToken>,
    is_login: bool,
}

/// In-process [`CredentialStore`].
///
/// The "persisted" token and the login flag are stored separately so the
/// restart skew can be reproduced with [`MemoryCredentialStore::restored`].
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: RwLock<MemoryState>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that has a persisted token but has not restored its login flag,
    /// the state right after a process restart.
    #[must_use]
    pub fn restored(token: BearerToken) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                token: Some(token),
                is_login: false,
            }),
        }
    }

    /// Store with a live, fully restored session.
    #[must_use]
    pub fn logged_in(token: BearerToken) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                token: Some(token),
                is_login: true,
            }),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<BearerToken> {
        self.state.read().token.clone()
    }

    fn is_login(&self) -> bool {
        self.state.read().is_login
    }

    fn set_token(&self, token: BearerToken) -> Result<(), SessionError> {
        let mut state = self.state.write();
        state.token = Some(token);
        state.is_login = true;
        Ok(())
    }

    fn mark_logged_in(&self) {
        self.state.write().is_login = true;
    }

    fn logout(&self, silent: bool) {
        let mut state = self.state.write();
        state.token = None;
        state.is_login = false;
        tracing::debug!(silent, "session cleared");
    }
}
