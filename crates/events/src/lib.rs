//! Real-time fan-out for the live-classroom backend.
//!
//! - [`Broadcaster`] is the capability engines publish through:
//!   `publish(room, event, payload)`, fire-and-forget.
//! - [`EventBus`] is the in-process implementation backed by
//!   `tokio::sync::broadcast`; the WebSocket relay subscribes to it and
//!   forwards each [`RoomEvent`] to the sockets in that room.
//! - [`NoopBroadcaster`] discards everything.

pub mod bus;

pub use bus::{Broadcaster, EventBus, NoopBroadcaster, RoomEvent};
