use std::sync::Arc;

use liveclass_db::Datastore;
use liveclass_events::{Broadcaster, EventBus};

use crate::config::ServerConfig;
use crate::engine::{AttendanceEngine, ChatEngine, PollEngine, SessionEngine};
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Persistence store (PostgreSQL or in-memory).
    pub store: Datastore,
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Room-scoped real-time events, relayed to sockets by `ws::relay`.
    pub event_bus: Arc<EventBus>,
    pub sessions: Arc<SessionEngine>,
    pub attendance: Arc<AttendanceEngine>,
    pub polls: Arc<PollEngine>,
    pub chat: Arc<ChatEngine>,
}

impl AppState {
    /// Wire the engines onto `store`, publishing through `event_bus`.
    pub fn new(
        store: Datastore,
        config: Arc<ServerConfig>,
        ws_manager: Arc<WsManager>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let broadcaster: Arc<dyn Broadcaster> = event_bus.clone();
        let attendance = AttendanceEngine::new(store.clone(), Arc::clone(&broadcaster));
        let sessions = SessionEngine::new(
            store.clone(),
            Arc::clone(&broadcaster),
            attendance.clone(),
        );
        let polls = PollEngine::new(store.clone(), Arc::clone(&broadcaster), attendance.clone());
        let chat = ChatEngine::new(store.clone(), broadcaster, attendance.clone());

        Self {
            store,
            config,
            ws_manager,
            event_bus,
            sessions: Arc::new(sessions),
            attendance: Arc::new(attendance),
            polls: Arc::new(polls),
            chat: Arc::new(chat),
        }
    }
}
