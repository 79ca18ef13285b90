//! Single-flight token refresh.
//!
//! When a request comes back 401 the client asks the [`RefreshCoordinator`]
//! to recover. At most one refresh exchange is in flight: the first request
//! to arrive leads it, later ones park until it settles and then share its
//! outcome. Parked requests are released in arrival order.
//!
//! The state lock is only ever held for bookkeeping, never across an await.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::RefreshFailure;

type Outcome = Result<(), RefreshFailure>;

/// Rejection for a 401 that arrives after the session was torn down.
pub const SESSION_ENDED: &str = "session already ended";

enum State {
    Idle,
    Refreshing { waiters: Vec<oneshot::Sender<Outcome>> },
}

/// What a recovering request does.
enum Role {
    /// Runs the exchange.
    Leader,
    /// Waits for the running exchange.
    Waiter(oneshot::Receiver<Outcome>),
    /// The token already changed since the request was sent; just replay.
    Rotated,
    /// The request carried a token but the store is now empty.
    Ended,
}

/// Serializes refresh exchanges across concurrent requests.
pub struct RefreshCoordinator {
    state: Mutex<State>,
    refreshes: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Idle),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Whether an exchange is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), State::Refreshing { .. })
    }

    /// Requests parked on the in-flight exchange.
    pub fn waiting(&self) -> usize {
        match &*self.state.lock() {
            State::Idle => 0,
            State::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Number of exchanges started since creation.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Recover from a 401 on a request that carried `sent_with`.
    ///
    /// `current_token` reads the stored access token. It is consulted only
    /// when no exchange is running, under the state lock. `refresh` performs
    /// the exchange, including persisting or clearing tokens, and runs only if
    /// this caller becomes the leader.
    ///
    /// A request that carried a token while the store is now empty lost a
    /// session that was already ended, and is rejected without a refresh.
    ///
    /// `Ok(())` means the request should be replayed once.
    pub async fn recover<C, F, Fut>(
        &self,
        sent_with: Option<&str>,
        current_token: C,
        refresh: F,
    ) -> Outcome
    where
        C: FnOnce() -> Option<String>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let role = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Role::Waiter(rx)
                }
                State::Idle => {
                    let current = current_token();
                    if current.is_none() && sent_with.is_some() {
                        Role::Ended
                    } else if current.is_some() && current.as_deref() != sent_with {
                        Role::Rotated
                    } else {
                        *state = State::Refreshing {
                            waiters: Vec::new(),
                        };
                        Role::Leader
                    }
                }
            }
        };

        match role {
            Role::Rotated => {
                tracing::debug!("Access token rotated since request was sent; replaying");
                Ok(())
            }
            Role::Ended => {
                tracing::debug!("Session already ended; not refreshing");
                Err(RefreshFailure::new(SESSION_ENDED))
            }
            Role::Waiter(rx) => {
                tracing::debug!("Waiting for in-flight token refresh");
                rx.await
                    .unwrap_or_else(|_| Err(RefreshFailure::new("token refresh was abandoned")))
            }
            Role::Leader => {
                let count = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!(refresh = count, "Starting token refresh");

                let mut guard = LeaderGuard {
                    coordinator: self,
                    settled: false,
                };
                let outcome = refresh().await;
                guard.settle(outcome.clone());
                outcome
            }
        }
    }

    fn settle(&self, outcome: &Outcome) {
        let waiters = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Idle) {
                State::Refreshing { waiters } => waiters,
                State::Idle => Vec::new(),
            }
        };

        tracing::debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "Token refresh settled"
        );
        for waiter in waiters {
            // A waiter whose request was cancelled has dropped its receiver.
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("refresh_count", &self.refresh_count())
            .finish()
    }
}

/// Returns the coordinator to idle if the leading future is dropped
/// mid-exchange, so parked requests are not stranded.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(&mut self, outcome: Outcome) {
        self.settled = true;
        self.coordinator.settle(&outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Token refresh cancelled before completion");
            self.coordinator
                .settle(&Err(RefreshFailure::new("token refresh was abandoned")));
        }
    }
}
