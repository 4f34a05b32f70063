pub mod attendance;
pub mod chat;
pub mod health;
pub mod polls;
pub mod sessions;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                                      WebSocket (?token=<jwt>)
///
/// /sessions                                                list, create
/// /sessions/{id}                                           get, update, delete (cancel)
/// /sessions/{id}/start|pause|resume|end|cancel             lifecycle (POST)
/// /sessions/{id}/enroll                                    enroll students (POST)
/// /sessions/{id}/join                                      join (POST)
/// /sessions/{id}/leave                                     leave (POST)
///
/// /sessions/{id}/attendance/me                             own record
/// /sessions/{id}/attendance/dashboard                      monitoring dashboard
/// /sessions/{id}/attendance/summary                        status counts
/// /sessions/{id}/attendance/activity                       report activity (POST)
/// /sessions/{id}/attendance/location                       report location (POST)
/// /sessions/{id}/attendance/{student_id}/alerts            raise alert (POST)
/// /sessions/{id}/attendance/{student_id}/alerts/{alert_id}/resolve
/// /sessions/{id}/attendance/{student_id}/engagement        adjust counters (POST)
///
/// /sessions/{id}/polls                                     list, create
/// /polls/{id}                                              get, delete
/// /polls/{id}/vote                                         vote (POST)
/// /polls/{id}/close                                        close (POST)
///
/// /sessions/{id}/messages                                  list, send
/// /messages/{id}                                           edit, delete
/// /messages/{id}/reactions                                 add (POST), remove (DELETE)
/// /messages/{id}/read                                      mark read (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        // Sessions plus their attendance, poll and chat sub-resources.
        .nest(
            "/sessions",
            sessions::router()
                .merge(attendance::session_router())
                .merge(polls::session_router())
                .merge(chat::session_router()),
        )
        .nest("/polls", polls::router())
        .nest("/messages", chat::router())
}
