//! Route definitions for session chat.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::chat;
use crate::state::AppState;

/// Session-scoped chat routes, merged into `/sessions`.
///
/// ```text
/// GET    /{id}/messages        list_messages (?limit, ?offset)
/// POST   /{id}/messages        send_message
/// ```
pub fn session_router() -> Router<AppState> {
    Router::new().route(
        "/{id}/messages",
        get(chat::list_messages).post(chat::send_message),
    )
}

/// Message routes, mounted at `/messages`.
///
/// ```text
/// PUT    /{id}                 edit_message
/// DELETE /{id}                 delete_message
/// POST   /{id}/reactions       add_reaction
/// DELETE /{id}/reactions       remove_reaction
/// POST   /{id}/read            mark_read
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", put(chat::edit_message).delete(chat::delete_message))
        .route(
            "/{id}/reactions",
            post(chat::add_reaction).delete(chat::remove_reaction),
        )
        .route("/{id}/read", post(chat::mark_read))
}
