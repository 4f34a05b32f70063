//! Fan-out from the in-process [`EventBus`] to WebSocket rooms.

use std::sync::Arc;

use liveclass_core::realtime::ServerMessage;
use liveclass_events::{EventBus, RoomEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::handler::encode;
use super::manager::WsManager;

/// Subscribe to `event_bus` and forward every event to the sockets in its room.
///
/// The task exits when `cancel` fires or the bus is dropped.
pub fn start_relay(
    event_bus: &EventBus,
    ws_manager: Arc<WsManager>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let receiver = event_bus.subscribe();
    tokio::spawn(run(receiver, ws_manager, cancel))
}

async fn run(
    mut receiver: broadcast::Receiver<RoomEvent>,
    ws_manager: Arc<WsManager>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Room relay stopping");
                break;
            }
            received = receiver.recv() => match received {
                Ok(event) => deliver(&ws_manager, event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Room relay lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, room relay shutting down");
                    break;
                }
            }
        }
    }
}

async fn deliver(ws_manager: &WsManager, event: RoomEvent) {
    let room = event.room.clone();
    let name = event.event.clone();
    let Some(message) = encode(&ServerMessage::Event {
        room: event.room,
        event: event.event,
        payload: event.payload,
        timestamp: event.timestamp,
    }) else {
        return;
    };
    let delivered = ws_manager.send_to_room(&room, message).await;
    tracing::trace!(room = %room, event = %name, delivered, "Room event relayed");
}
