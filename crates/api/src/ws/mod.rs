//! WebSocket infrastructure for real-time classroom traffic.
//!
//! Provides connection and room management, heartbeat monitoring, the relay
//! from the event bus to subscribed sockets, and the HTTP upgrade handler.

mod handler;
mod heartbeat;
pub mod manager;
mod relay;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
pub use relay::start_relay;
