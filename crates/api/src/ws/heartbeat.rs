use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::ws::manager::WsManager;

/// Ping every open classroom socket each `every`.
///
/// The first round goes out immediately. Abort the handle on shutdown.
pub fn start_heartbeat(ws_manager: Arc<WsManager>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let connections = ws_manager.connection_count().await;
            if connections == 0 {
                continue;
            }
            tracing::trace!(connections, "Pinging classroom sockets");
            ws_manager.ping_all().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use axum::extract::ws::Message;
    use liveclass_core::roles::Role;

    use super::*;
    use crate::middleware::auth::AuthUser;

    #[tokio::test]
    async fn test_heartbeat_pings_open_sockets() {
        let manager = Arc::new(WsManager::new());
        let user = AuthUser {
            user_id: 7,
            role: Role::Student,
            college_id: 1,
        };
        let mut rx = manager.add("conn-1".to_string(), user).await;

        let handle = start_heartbeat(Arc::clone(&manager), Duration::from_millis(10));
        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no ping within a second")
            .expect("channel closed");
        assert!(matches!(frame, Message::Ping(_)));
        handle.abort();
    }
}
