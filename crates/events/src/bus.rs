//! In-process room event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` across the application. Engines
//! see it only through the [`Broadcaster`] trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// RoomEvent
// ---------------------------------------------------------------------------

/// An event addressed to one broadcast room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEvent {
    /// Room key, e.g. `"session-42"` or `"session-42-monitor"`.
    pub room: String,

    /// Event name, e.g. `"poll_updated"`.
    pub event: String,

    /// Event-specific JSON payload.
    pub payload: serde_json::Value,

    /// When the event was published (UTC).
    pub timestamp: DateTime<Utc>,
}

impl RoomEvent {
    pub fn new(
        room: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            room: room.into(),
            event: event.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Publish an event to a room.
///
/// Implementations must never block and never fail the caller; delivery is
/// at-most-once with no replay.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, room: &str, event: &str, payload: serde_json::Value);
}

/// Broadcaster that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn publish(&self, room: &str, event: &str, _payload: serde_json::Value) {
        tracing::trace!(room, event, "Dropping event (no-op broadcaster)");
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use liveclass_events::{Broadcaster, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish("session-1", "session_started", serde_json::json!({}));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<RoomEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed events are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send a prepared event to all current subscribers.
    pub fn send(&self, event: RoomEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to every event published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Broadcaster for EventBus {
    fn publish(&self, room: &str, event: &str, payload: serde_json::Value) {
        tracing::debug!(room, event, "Publishing room event");
        self.send(RoomEvent::new(room, event, payload));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
