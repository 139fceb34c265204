//! Single-flight coordination of access-token refreshes.
//!
//! The first caller to see a 401 becomes the leader and performs the refresh.
//! Callers arriving while it is in flight are parked in a FIFO queue and woken
//! with the outcome once the leader settles.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::debug;

/// Outcome delivered to parked callers: the new access token, or the reason
/// the refresh failed.
pub type RefreshOutcome = Result<String, String>;

#[derive(Default)]
struct RefreshState {
    in_progress: bool,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// What a caller that just saw a 401 should do next.
pub enum RefreshTicket<'a> {
    /// No refresh in flight: this caller performs it.
    Lead(RefreshGuard<'a>),
    /// A refresh is in flight: wait for its outcome.
    Wait(oneshot::Receiver<RefreshOutcome>),
    /// A refresh already completed after this request was sent; replay with
    /// the current token.
    Current(String),
}

#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide how a caller that got a 401 proceeds.
    ///
    /// `sent_with` is the token the failed request carried and `current`
    /// reads the session's token; both are compared under the coordinator
    /// lock so a leader cannot settle in between.
    pub fn begin<F>(&self, sent_with: Option<&str>, current: F) -> RefreshTicket<'_>
    where
        F: FnOnce() -> Option<String>,
    {
        let mut state = self.lock();
        if state.in_progress {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(queued = state.waiters.len(), "refresh in flight, queueing request");
            return RefreshTicket::Wait(rx);
        }

        if let Some(token) = current() {
            if sent_with != Some(token.as_str()) {
                return RefreshTicket::Current(token);
            }
        }

        state.in_progress = true;
        RefreshTicket::Lead(RefreshGuard {
            coordinator: self,
            settled: false,
        })
    }

    pub fn in_progress(&self) -> bool {
        self.lock().in_progress
    }

    pub fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    fn settle(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.lock();
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };
        debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "refresh settled, draining queue"
        );
        for waiter in waiters {
            // A waiter whose caller went away has nothing to receive
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Held by the refresh leader. Settling (or dropping) it clears the
/// in-progress flag and drains the queue in FIFO order.
pub struct RefreshGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshGuard<'_> {
    pub fn resolve(mut self, token: String) {
        self.settled = true;
        self.coordinator.settle(Ok(token));
    }

    pub fn reject(mut self, reason: impl Into<String>) {
        self.settled = true;
        self.coordinator.settle(Err(reason.into()));
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator
                .settle(Err("token refresh was abandoned".to_string()));
        }
    }
}
