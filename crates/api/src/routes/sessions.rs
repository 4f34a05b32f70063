//! Route definitions for class sessions.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Session routes, mounted at `/sessions`.
///
/// ```text
/// GET    /                     list_sessions (?status, ?limit, ?offset)
/// POST   /                     create_session
/// GET    /{id}                 get_session
/// PUT    /{id}                 update_session
/// DELETE /{id}                 delete_session
/// POST   /{id}/start           start_session
/// POST   /{id}/pause           pause_session
/// POST   /{id}/resume          resume_session
/// POST   /{id}/end             end_session
/// POST   /{id}/cancel          cancel_session
/// POST   /{id}/enroll          enroll_students
/// POST   /{id}/join            join_session
/// POST   /{id}/leave           leave_session
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/{id}",
            get(sessions::get_session)
                .put(sessions::update_session)
                .delete(sessions::delete_session),
        )
        .route("/{id}/start", post(sessions::start_session))
        .route("/{id}/pause", post(sessions::pause_session))
        .route("/{id}/resume", post(sessions::resume_session))
        .route("/{id}/end", post(sessions::end_session))
        .route("/{id}/cancel", post(sessions::cancel_session))
        .route("/{id}/enroll", post(sessions::enroll_students))
        .route("/{id}/join", post(sessions::join_session))
        .route("/{id}/leave", post(sessions::leave_session))
}
