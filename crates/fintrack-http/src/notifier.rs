//! Session lifecycle notifications.

use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the broadcast buffer. Slow subscribers that fall further
/// behind than this observe `RecvError::Lagged` and skip ahead.
const EVENT_CAPACITY: usize = 16;

/// A session lifecycle event published to subscribers such as a UI shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A request found the stored session expired; a background refresh starts now.
    Expired,
    /// The background refresh obtained a new access token.
    Refreshed,
    /// The session ended, either by a failed refresh or by logout.
    Ended,
}

/// Broadcasts [`SessionEvent`]s.
///
/// Publishing never blocks and never fails: events sent while nobody is
/// subscribed are dropped.
#[derive(Debug, Clone)]
pub struct SessionNotifier {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to every current subscriber.
    pub fn publish(&self, event: SessionEvent) {
        let delivered = self.sender.send(event).unwrap_or(0);
        trace!(?event, delivered, "session event published");
    }

    pub fn session_expired(&self) {
        self.publish(SessionEvent::Expired);
    }

    pub fn session_refreshed(&self) {
        self.publish(SessionEvent::Refreshed);
    }

    pub fn session_ended(&self) {
        self.publish(SessionEvent::Ended);
    }
}

impl Default for SessionNotifier {
    fn default() -> Self {
        Self::new()
    }
}
