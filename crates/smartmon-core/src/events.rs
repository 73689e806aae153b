//! Subscriber notifications emitted by the sync engine.
//!
//! Events are delivered over a `tokio::sync::broadcast` channel. The engine
//! sends while holding its state lock, so the order subscribers observe is
//! the order in which state changed. A subscriber that falls more than the
//! channel capacity behind receives `RecvError::Lagged` and should resync
//! from [`SyncEngine::snapshot`](crate::sync::SyncEngine::snapshot).

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{Error, ErrorKind};
use crate::projection::ViewState;

/// The engine operation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// A scheduled or out-of-band poll tick.
    Poll,
    /// A mode change request.
    SetMode,
    /// A threshold update request.
    SetThreshold,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Poll => write!(f, "poll"),
            Operation::SetMode => write!(f, "set_mode"),
            Operation::SetThreshold => write!(f, "set_threshold"),
        }
    }
}

/// A failure reported to subscribers instead of being returned to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub operation: Operation,
    pub kind: ErrorKind,
    pub message: String,
}

impl SyncFailure {
    pub fn new(operation: Operation, error: &Error) -> Self {
        Self {
            operation,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({}): {}", self.operation, self.kind, self.message)
    }
}

/// Notifications pushed to subscribers.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncEvent {
    /// State changed: a poll reconciled, or an optimistic edit was applied
    /// or rolled back.
    ViewChanged(ViewState),
    /// A poll or mutation failed. State is unchanged unless a rollback
    /// follows as a separate `ViewChanged`.
    Failed(SyncFailure),
}

/// Sender for sync events.
pub type EventSender = broadcast::Sender<SyncEvent>;

/// Receiver for sync events.
pub type EventReceiver = broadcast::Receiver<SyncEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SyncEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_from_error() {
        let err = Error::unavailable("http://x/settings", "connection refused");
        let failure = SyncFailure::new(Operation::SetThreshold, &err);

        assert_eq!(failure.kind, ErrorKind::Transport);
        assert_eq!(failure.operation, Operation::SetThreshold);
        assert!(failure.to_string().starts_with("set_threshold failed (transport)"));
    }

    #[test]
    fn test_dispatch_without_receivers_is_silent() {
        let dispatcher = EventDispatcher::new(4);
        assert_eq!(dispatcher.receiver_count(), 0);
        dispatcher.send(SyncEvent::ViewChanged(ViewState::empty(20)));
    }

    #[test]
    fn test_all_subscribers_receive() {
        let dispatcher = EventDispatcher::new(4);
        let mut a = dispatcher.subscribe();
        let mut b = dispatcher.subscribe();

        let err = Error::invalid_response("http://x/sensor-data", "truncated");
        dispatcher.send(SyncEvent::Failed(SyncFailure::new(Operation::Poll, &err)));

        for rx in [&mut a, &mut b] {
            match rx.try_recv() {
                Ok(SyncEvent::Failed(f)) => assert_eq!(f.kind, ErrorKind::Decode),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
