//! Event types and event bus for the sorter engine
//!
//! The sorter communicates with its embedder through a broadcast bus:
//! - **EventBus** (tokio::broadcast): one-to-many event delivery
//! - Subscribers receive lifecycle transitions, status strings, terminal
//!   completion, and failures
//!
//! Events use one central enum so handlers get exhaustive matching instead
//! of string-keyed callbacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Error;

/// Sorter event types
///
/// Broadcast via [`EventBus`]; serializable so an embedder can forward them
/// over SSE or log them as structured records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SorterEvent {
    /// The sorter started or finished a run
    ActiveChanged {
        /// True while a run is executing
        active: bool,
        /// When the transition happened
        timestamp: DateTime<Utc>,
    },

    /// Human-readable description of the current phase
    /// ("fetching playlist items…", "reordering 3 of 11…", ...)
    StatusChanged {
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// A one-shot sort finished applying every planned operation
    SortCompleted {
        /// Playlist that was sorted
        playlist_id: String,
        /// How many reorder operations were applied
        operations_applied: usize,
        timestamp: DateTime<Utc>,
    },

    /// A run halted on an unrecoverable error. Cancellation is never
    /// reported this way.
    SortFailed {
        playlist_id: String,
        /// Machine-matchable failure category
        kind: FailureKind,
        /// Human-readable description
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl SorterEvent {
    pub fn active(active: bool) -> Self {
        SorterEvent::ActiveChanged {
            active,
            timestamp: Utc::now(),
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        SorterEvent::StatusChanged {
            status: status.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn completed(playlist_id: impl Into<String>, operations_applied: usize) -> Self {
        SorterEvent::SortCompleted {
            playlist_id: playlist_id.into(),
            operations_applied,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(playlist_id: impl Into<String>, error: &Error) -> Self {
        SorterEvent::SortFailed {
            playlist_id: playlist_id.into(),
            kind: FailureKind::from(error),
            reason: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Failure category carried by [`SorterEvent::SortFailed`]
///
/// The error value itself is not `Clone`, so subscribers get this closed
/// enum plus the rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport failure reaching the streaming service
    Network,
    /// Non-success response from the streaming service
    Api,
    /// A required response field was absent
    MissingField,
    /// Sequencing bug inside the engine or its caller
    InvalidState,
    /// Configuration problem
    Config,
    /// Anything else
    Internal,
}

impl From<&Error> for FailureKind {
    fn from(error: &Error) -> Self {
        match error {
            Error::Network(_) => FailureKind::Network,
            Error::Api { .. } => FailureKind::Api,
            Error::MissingField(_) => FailureKind::MissingField,
            Error::InvalidState(_) => FailureKind::InvalidState,
            Error::Config(_) => FailureKind::Config,
            Error::Io(_) | Error::Cancelled => FailureKind::Internal,
        }
    }
}

/// Broadcast bus carrying [`SorterEvent`]s to every subscriber
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SorterEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity.
    ///
    /// When a subscriber falls more than `capacity` events behind, the
    /// oldest events are dropped for that subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SorterEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` otherwise.
    pub fn emit(&self, event: SorterEvent) -> Result<usize, broadcast::error::SendError<SorterEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the case where nobody is listening.
    pub fn emit_lossy(&self, event: SorterEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!("No subscribers for event: {:?}", e.0);
        }
    }

    /// Number of currently connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Channel capacity this bus was created with
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(100);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_eventbus_emit_no_subscribers() {
        let bus = EventBus::new(100);

        // Should return error when no subscribers
        assert!(bus.emit(SorterEvent::active(true)).is_err());
    }

    #[tokio::test]
    async fn test_eventbus_emit_with_subscriber() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        assert!(bus.emit(SorterEvent::status("planning operations…")).is_ok());

        let received = rx.recv().await.unwrap();
        match received {
            SorterEvent::StatusChanged { status, .. } => {
                assert_eq!(status, "planning operations…");
            }
            _ => panic!("Wrong event type received"),
        }
    }

    #[tokio::test]
    async fn test_eventbus_emit_lossy() {
        let bus = EventBus::new(100);

        // Should not panic even without subscribers
        bus.emit_lossy(SorterEvent::active(false));
    }

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            FailureKind::from(&Error::Network("timed out".into())),
            FailureKind::Network
        );
        assert_eq!(
            FailureKind::from(&Error::Api {
                status: 500,
                message: String::new()
            }),
            FailureKind::Api
        );
        assert_eq!(
            FailureKind::from(&Error::MissingField("snapshot".into())),
            FailureKind::MissingField
        );
    }

    #[test]
    fn test_failed_event_carries_kind_and_reason() {
        let error = Error::MissingField("playlist snapshot ID".into());
        match SorterEvent::failed("playlist-1", &error) {
            SorterEvent::SortFailed {
                playlist_id,
                kind,
                reason,
                ..
            } => {
                assert_eq!(playlist_id, "playlist-1");
                assert_eq!(kind, FailureKind::MissingField);
                assert!(reason.contains("playlist snapshot ID"));
            }
            _ => panic!("Expected SortFailed"),
        }
    }
}
