//! Single-flight refresh coordination.
//!
//! The coordinator is a two-state machine. In `Idle` nothing is refreshing.
//! The first request that observes an expired session takes the refresh slot
//! and moves the machine to `Refreshing`; every request that fails
//! authentication while the slot is held is queued instead of starting its
//! own refresh. When the refresh settles, the slot holder drains the whole
//! queue in one step and the machine returns to `Idle`.
//!
//! The queue lives inside the `Refreshing` state, so it is always empty once
//! the machine is back in `Idle`.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use fintrack_core::error::{AuthError, Error};
use fintrack_core::{AccessToken, ApiRequest, ApiResponse, Result};

/// Receives the outcome of a request queued behind a refresh.
pub type PendingReply = oneshot::Receiver<Result<ApiResponse>>;

/// A request captured while a refresh was in flight.
#[derive(Debug)]
pub struct PendingRequest {
    request: ApiRequest,
    reply: oneshot::Sender<Result<ApiResponse>>,
}

impl PendingRequest {
    fn new(request: ApiRequest) -> (Self, PendingReply) {
        let (reply, receiver) = oneshot::channel();
        (Self { request, reply }, receiver)
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }

    /// Deliver the replay result to the waiting caller.
    ///
    /// A caller that stopped waiting is ignored.
    pub fn complete(self, result: Result<ApiResponse>) {
        let _ = self.reply.send(result);
    }
}

/// How a refresh settled.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// A new access token is stored.
    Refreshed(AccessToken),
    /// The refresh failed; the session is over.
    Failed(Arc<Error>),
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Refreshing {
        queue: Vec<PendingRequest>,
    },
}

/// Guards the refresh flag and the queue of requests waiting on it.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<State>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true while a refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), State::Refreshing { .. })
    }

    /// Number of requests waiting on the in-flight refresh.
    pub fn queued(&self) -> usize {
        match &*self.lock() {
            State::Idle => 0,
            State::Refreshing { queue } => queue.len(),
        }
    }

    /// Move from `Idle` to `Refreshing`.
    ///
    /// Returns `None` if a refresh is already in flight. The returned slot
    /// must be drained with the refresh outcome; dropping it undrained rejects
    /// every queued request with [`AuthError::RefreshAbandoned`].
    pub fn acquire_refresh_slot(&self) -> Option<RefreshSlot<'_>> {
        let mut state = self.lock();
        if matches!(*state, State::Refreshing { .. }) {
            return None;
        }
        *state = State::Refreshing { queue: Vec::new() };
        debug!("refresh slot acquired");
        Some(RefreshSlot {
            coordinator: self,
            drained: false,
        })
    }

    /// Queue a request behind the in-flight refresh.
    ///
    /// Returns the request back if no refresh is in flight, which happens when
    /// the refresh settled between the caller's failed slot acquisition and
    /// this call.
    pub fn enqueue(&self, request: ApiRequest) -> std::result::Result<PendingReply, ApiRequest> {
        let mut state = self.lock();
        match &mut *state {
            State::Idle => Err(request),
            State::Refreshing { queue } => {
                let (pending, receiver) = PendingRequest::new(request);
                queue.push(pending);
                debug!(queued = queue.len(), "request queued behind refresh");
                Ok(receiver)
            }
        }
    }

    fn take_queue(&self) -> Vec<PendingRequest> {
        match mem::take(&mut *self.lock()) {
            State::Idle => Vec::new(),
            State::Refreshing { queue } => queue,
        }
    }
}

/// Exclusive right to perform the one in-flight refresh.
#[derive(Debug)]
pub struct RefreshSlot<'a> {
    coordinator: &'a RefreshCoordinator,
    drained: bool,
}

impl RefreshSlot<'_> {
    /// Settle the refresh: return to `Idle` and take the whole queue at once.
    ///
    /// On [`RefreshOutcome::Failed`] every queued request is rejected with
    /// [`AuthError::RefreshFailed`] sharing the same cause, and the returned
    /// list is empty. On [`RefreshOutcome::Refreshed`] the queued requests are
    /// returned in arrival order for the caller to replay.
    pub fn drain(mut self, outcome: &RefreshOutcome) -> Vec<PendingRequest> {
        self.drained = true;
        let queue = self.coordinator.take_queue();
        debug!(queued = queue.len(), "refresh slot drained");

        match outcome {
            RefreshOutcome::Refreshed(_) => queue,
            RefreshOutcome::Failed(cause) => {
                for pending in queue {
                    pending.complete(Err(Error::Auth(AuthError::RefreshFailed(Arc::clone(
                        cause,
                    )))));
                }
                Vec::new()
            }
        }
    }
}

impl Drop for RefreshSlot<'_> {
    fn drop(&mut self) {
        if self.drained {
            return;
        }
        let queue = self.coordinator.take_queue();
        debug!(queued = queue.len(), "refresh slot abandoned");
        for pending in queue {
            pending.complete(Err(AuthError::RefreshAbandoned.into()));
        }
    }
}
