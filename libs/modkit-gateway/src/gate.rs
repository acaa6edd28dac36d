//! Login synchronization gate.
//!
//! Requests that need authentication while no session exists park here until
//! the in-flight login settles. The gate holds at most one pending login at a
//! time; every request that starts waiting while it is pending observes the
//! same settlement.
//!
//! ```text
//!   Idle ──subscribe──▶ Pending ──notify_success / notify_fail──▶ Idle
//!                          │
//!                          └──last waiter gives up (timeout)────▶ Idle
//! ```
//!
//! Each waiter races its own timeout against the shared outcome. A timed-out
//! waiter never settles the login for the others; the cycle is only closed
//! early once nobody is waiting on it anymore, so the next gated request opens
//! a fresh cycle (and prompts for login again) instead of joining a dead one.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

/// Default time a gated request waits for login.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Reason reported through [`LoginGate::notify_fail`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct LoginFailure {
    reason: String,
}

impl LoginFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Outcome of [`LoginTicket::wait`] other than success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LoginWaitError {
    /// Neither success nor failure arrived in time
    #[error("login timed out after {0:?}")]
    Timeout(Duration),

    /// Login was reported as failed
    #[error("login failed: {0}")]
    Failed(LoginFailure),
}

type LoginOutcome = Result<(), LoginFailure>;
type SharedOutcome = Shared<BoxFuture<'static, LoginOutcome>>;

struct PendingLogin {
    cycle: u64,
    waiters: usize,
    settle: oneshot::Sender<LoginOutcome>,
    outcome: SharedOutcome,
}

#[derive(Default)]
struct GateState {
    pending: Option<PendingLogin>,
    next_cycle: u64,
}

/// Single-slot wait/notify primitive shared by all requests of a gateway.
///
/// `LoginGate` is [`Clone`] + [`Send`] + [`Sync`]; clones share the slot.
#[derive(Clone, Default)]
pub struct LoginGate {
    state: Arc<Mutex<GateState>>,
}

impl fmt::Debug for LoginGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LoginGate")
            .field("pending", &state.pending.is_some())
            .field(
                "waiters",
                &state.pending.as_ref().map_or(0, |p| p.waiters),
            )
            .finish()
    }
}

impl LoginGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the pending login, opening one if the gate is idle.
    ///
    /// The returned ticket reports whether this call opened the cycle, which
    /// the gateway uses to prompt for login exactly once per cycle.
    #[must_use]
    pub fn subscribe(&self) -> LoginTicket {
        let mut state = self.state.lock();

        if let Some(pending) = state.pending.as_mut() {
            pending.waiters += 1;
            return LoginTicket {
                gate: self.clone(),
                cycle: pending.cycle,
                leader: false,
                outcome: pending.outcome.clone(),
            };
        }

        let cycle = state.next_cycle;
        state.next_cycle += 1;

        let (settle, rx) = oneshot::channel::<LoginOutcome>();
        let outcome = rx
            .map(|received| {
                received.unwrap_or_else(|_| Err(LoginFailure::new("login gate closed")))
            })
            .boxed()
            .shared();

        state.pending = Some(PendingLogin {
            cycle,
            waiters: 1,
            settle,
            outcome: outcome.clone(),
        });
        tracing::debug!(cycle, "login gate opened");

        LoginTicket {
            gate: self.clone(),
            cycle,
            leader: true,
            outcome,
        }
    }

    /// Wait for the pending login (opening one if needed).
    ///
    /// The caller joins the cycle immediately; only the wait itself is
    /// deferred to the returned future.
    ///
    /// The future resolves to [`LoginWaitError::Failed`] if the login is
    /// reported as failed and to [`LoginWaitError::Timeout`] if nothing
    /// settles within `timeout`.
    pub fn wait_for_login(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), LoginWaitError>> + Send + 'static {
        self.subscribe().wait(timeout)
    }

    /// Settle the pending login as successful. No-op when idle.
    pub fn notify_success(&self) {
        self.settle(Ok(()));
    }

    /// Settle the pending login as failed. No-op when idle.
    pub fn notify_fail(&self, failure: LoginFailure) {
        self.settle(Err(failure));
    }

    /// Whether a login is currently pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Number of requests waiting on the pending login.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.state.lock().pending.as_ref().map_or(0, |p| p.waiters)
    }

    fn settle(&self, outcome: LoginOutcome) {
        let Some(pending) = self.state.lock().pending.take() else {
            tracing::trace!("login settled with no pending waiters");
            return;
        };

        match &outcome {
            Ok(()) => tracing::info!(
                cycle = pending.cycle,
                waiters = pending.waiters,
                "login succeeded; releasing waiters"
            ),
            Err(failure) => tracing::info!(
                cycle = pending.cycle,
                waiters = pending.waiters,
                reason = failure.reason(),
                "login failed; rejecting waiters"
            ),
        }

        if pending.settle.send(outcome).is_err() {
            tracing::trace!(cycle = pending.cycle, "login outcome receiver already gone");
        }
    }

    fn leave(&self, cycle: u64) {
        let mut state = self.state.lock();
        let Some(pending) = state.pending.as_mut() else {
            return;
        };
        if pending.cycle != cycle {
            return;
        }

        pending.waiters = pending.waiters.saturating_sub(1);
        if pending.waiters == 0 {
            state.pending = None;
            tracing::debug!(cycle, "login gate closed: no waiters left");
        }
    }
}

/// One waiter's handle on the pending login.
///
/// Dropping a ticket (after waiting, or without ever waiting) removes the
/// waiter from its cycle.
#[must_use = "a ticket does nothing unless waited on"]
pub struct LoginTicket {
    gate: LoginGate,
    cycle: u64,
    leader: bool,
    outcome: SharedOutcome,
}

impl LoginTicket {
    /// Whether this ticket opened the login cycle.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.leader
    }

    /// Wait for the shared login outcome, giving up after `timeout`.
    ///
    /// # Errors
    /// Returns [`LoginWaitError::Failed`] if the login is reported as failed
    /// and [`LoginWaitError::Timeout`] if nothing settles within `timeout`.
    pub async fn wait(self, timeout: Duration) -> Result<(), LoginWaitError> {
        let outcome = self.outcome.clone();
        match tokio::time::timeout(timeout, outcome).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(failure)) => Err(LoginWaitError::Failed(failure)),
            Err(_) => {
                tracing::debug!(cycle = self.cycle, ?timeout, "login wait timed out");
                Err(LoginWaitError::Timeout(timeout))
            }
        }
    }
}

impl fmt::Debug for LoginTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginTicket")
            .field("cycle", &self.cycle)
            .field("leader", &self.leader)
            .finish_non_exhaustive()
    }
}

impl Drop for LoginTicket {
    fn drop(&mut self) {
        self.gate.leave(self.cycle);
    }
}
