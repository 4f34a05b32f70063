//! Handlers for in-session polls.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use liveclass_core::poll::{NewPoll, PollSettings, PollType};
use liveclass_core::types::{DbId, Timestamp};

use crate::engine::VoteRequest;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireStaff;
use crate::response::DataResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Request bodies
   -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePollRequest {
    #[validate(length(min = 1, max = 500))]
    pub question: String,
    pub poll_type: PollType,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub options: Vec<String>,
    #[serde(default)]
    pub settings: PollSettings,
    #[serde(default)]
    pub is_anonymous: bool,
    pub expires_at: Option<Timestamp>,
}

impl From<CreatePollRequest> for NewPoll {
    fn from(req: CreatePollRequest) -> Self {
        NewPoll {
            question: req.question,
            poll_type: req.poll_type,
            options: req.options,
            settings: req.settings,
            is_anonymous: req.is_anonymous,
            expires_at: req.expires_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct VoteBody {
    pub option_index: Option<i64>,
    #[validate(length(max = 2000))]
    pub text_response: Option<String>,
    #[validate(range(min = 0.0))]
    pub response_time: Option<f64>,
}

/* --------------------------------------------------------------------------
   Handlers
   -------------------------------------------------------------------------- */

/// POST /sessions/{id}/polls
pub async fn create_poll(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<CreatePollRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let poll = state
        .polls
        .create(&auth.principal(), session_id, input.into())
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: poll })))
}

/// GET /sessions/{id}/polls
pub async fn list_session_polls(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let polls = state
        .polls
        .list_for_session(&auth.principal(), session_id)
        .await?;
    Ok(Json(DataResponse { data: polls }))
}

/// GET /polls/{id}
pub async fn get_poll(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let poll = state.polls.get(&auth.principal(), poll_id).await?;
    Ok(Json(DataResponse { data: poll }))
}

/// POST /polls/{id}/vote
pub async fn vote(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<DbId>,
    Json(input): Json<VoteBody>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let request = VoteRequest {
        option_index: input.option_index,
        text_response: input.text_response,
        response_time: input.response_time,
    };
    let poll = state.polls.vote(&auth.principal(), poll_id, request).await?;
    Ok(Json(DataResponse { data: poll }))
}

/// POST /polls/{id}/close
pub async fn close_poll(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(poll_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let poll = state.polls.close(&auth.principal(), poll_id).await?;
    Ok(Json(DataResponse { data: poll }))
}

/// DELETE /polls/{id}
pub async fn delete_poll(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(poll_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.polls.delete(&auth.principal(), poll_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
