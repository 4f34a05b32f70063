//! Handlers for session chat.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use liveclass_core::chat::MessageType;
use liveclass_core::types::DbId;

use crate::engine::OutgoingMessage;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Request bodies
   -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub reply_to: Option<DbId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditMessageRequest {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReactionRequest {
    #[validate(length(min = 1, max = 32))]
    pub emoji: String,
}

/* --------------------------------------------------------------------------
   Handlers
   -------------------------------------------------------------------------- */

/// GET /sessions/{id}/messages
///
/// Non-deleted messages, newest first.
pub async fn list_messages(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Query(page): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let messages = state
        .chat
        .list_messages(&auth.principal(), session_id, &page)
        .await?;
    Ok(Json(DataResponse { data: messages }))
}

/// POST /sessions/{id}/messages
pub async fn send_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let message = state
        .chat
        .send(
            &auth.principal(),
            session_id,
            OutgoingMessage {
                content: input.content,
                message_type: input.message_type,
                reply_to: input.reply_to,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: message })))
}

/// PUT /messages/{id}
pub async fn edit_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<DbId>,
    Json(input): Json<EditMessageRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let message = state
        .chat
        .edit(&auth.principal(), message_id, &input.content)
        .await?;
    Ok(Json(DataResponse { data: message }))
}

/// DELETE /messages/{id}
pub async fn delete_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let message = state.chat.delete(&auth.principal(), message_id).await?;
    Ok(Json(DataResponse { data: message }))
}

/// POST /messages/{id}/reactions
pub async fn add_reaction(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<DbId>,
    Json(input): Json<ReactionRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let message = state
        .chat
        .add_reaction(&auth.principal(), message_id, &input.emoji)
        .await?;
    Ok(Json(DataResponse { data: message }))
}

/// DELETE /messages/{id}/reactions
pub async fn remove_reaction(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<DbId>,
    Json(input): Json<ReactionRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let message = state
        .chat
        .remove_reaction(&auth.principal(), message_id, &input.emoji)
        .await?;
    Ok(Json(DataResponse { data: message }))
}

/// POST /messages/{id}/read
pub async fn mark_read(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let message = state.chat.mark_read(&auth.principal(), message_id).await?;
    Ok(Json(DataResponse { data: message }))
}
