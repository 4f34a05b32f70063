//! Route definitions for polls.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::polls;
use crate::state::AppState;

/// Session-scoped poll routes, merged into `/sessions`.
///
/// ```text
/// GET    /{id}/polls           list_session_polls
/// POST   /{id}/polls           create_poll
/// ```
pub fn session_router() -> Router<AppState> {
    Router::new().route(
        "/{id}/polls",
        get(polls::list_session_polls).post(polls::create_poll),
    )
}

/// Poll routes, mounted at `/polls`.
///
/// ```text
/// GET    /{id}                 get_poll
/// DELETE /{id}                 delete_poll
/// POST   /{id}/vote            vote
/// POST   /{id}/close           close_poll
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(polls::get_poll).delete(polls::delete_poll))
        .route("/{id}/vote", post(polls::vote))
        .route("/{id}/close", post(polls::close_poll))
}
