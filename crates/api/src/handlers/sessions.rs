//! Handlers for class sessions: scheduling, lifecycle, roster and presence.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use liveclass_core::session::{
    ClassSession, NewSession, SessionAction, SessionSettings, SessionStatus, SessionUpdate,
};
use liveclass_core::types::{DbId, Timestamp};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireStaff;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Request bodies
   -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    pub scheduled_start: Timestamp,
    pub scheduled_end: Option<Timestamp>,
    #[validate(range(min = 5, max = 480))]
    pub duration_minutes: i32,
    #[serde(default)]
    pub settings: SessionSettings,
}

impl From<CreateSessionRequest> for NewSession {
    fn from(req: CreateSessionRequest) -> Self {
        NewSession {
            title: req.title,
            description: req.description,
            subject: req.subject,
            scheduled_start: req.scheduled_start,
            scheduled_end: req.scheduled_end,
            duration_minutes: req.duration_minutes,
            settings: req.settings,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct EnrollRequest {
    #[validate(length(min = 1, max = 500))]
    pub student_ids: Vec<DbId>,
}

/// `?status=&limit=&offset=`
#[derive(Debug, Deserialize)]
pub struct SessionListParams {
    pub status: Option<SessionStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/* --------------------------------------------------------------------------
   CRUD
   -------------------------------------------------------------------------- */

/// POST /sessions
pub async fn create_session(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Json(input): Json<CreateSessionRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let session = state
        .sessions
        .create(&auth.principal(), input.into())
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: session })))
}

/// GET /sessions
///
/// Role-scoped: admins see their college, faculty their own sessions and
/// students the sessions they are enrolled in.
pub async fn list_sessions(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<SessionListParams>,
) -> AppResult<impl IntoResponse> {
    let page = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let sessions = state
        .sessions
        .list(&auth.principal(), params.status, &page)
        .await?;
    Ok(Json(DataResponse { data: sessions }))
}

/// GET /sessions/{id}
pub async fn get_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.get(&auth.principal(), session_id).await?;
    Ok(Json(DataResponse { data: session }))
}

/// PUT /sessions/{id}
pub async fn update_session(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<SessionUpdate>,
) -> AppResult<impl IntoResponse> {
    let session = state
        .sessions
        .update(&auth.principal(), session_id, input)
        .await?;
    Ok(Json(DataResponse { data: session }))
}

/// DELETE /sessions/{id}
///
/// Sessions are never removed; deleting one cancels it.
pub async fn delete_session(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let session = state
        .sessions
        .transition(&auth.principal(), session_id, SessionAction::Cancel)
        .await?;
    Ok(Json(DataResponse { data: session }))
}

/* --------------------------------------------------------------------------
   Lifecycle
   -------------------------------------------------------------------------- */

async fn transition(
    auth: AuthUser,
    state: AppState,
    session_id: DbId,
    action: SessionAction,
) -> AppResult<Json<DataResponse<ClassSession>>> {
    let session = state
        .sessions
        .transition(&auth.principal(), session_id, action)
        .await?;
    Ok(Json(DataResponse { data: session }))
}

/// POST /sessions/{id}/start
pub async fn start_session(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    transition(auth, state, session_id, SessionAction::Start).await
}

/// POST /sessions/{id}/pause
pub async fn pause_session(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    transition(auth, state, session_id, SessionAction::Pause).await
}

/// POST /sessions/{id}/resume
pub async fn resume_session(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    transition(auth, state, session_id, SessionAction::Resume).await
}

/// POST /sessions/{id}/end
pub async fn end_session(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    transition(auth, state, session_id, SessionAction::End).await
}

/// POST /sessions/{id}/cancel
pub async fn cancel_session(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    transition(auth, state, session_id, SessionAction::Cancel).await
}

/* --------------------------------------------------------------------------
   Roster and presence
   -------------------------------------------------------------------------- */

/// POST /sessions/{id}/enroll
pub async fn enroll_students(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<EnrollRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let outcome = state
        .sessions
        .enroll(&auth.principal(), session_id, &input.student_ids)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /sessions/{id}/join
pub async fn join_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let receipt = state.sessions.join(&auth.principal(), session_id).await?;
    Ok(Json(DataResponse { data: receipt }))
}

/// POST /sessions/{id}/leave
pub async fn leave_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.leave(&auth.principal(), session_id).await?;
    Ok(Json(DataResponse { data: session }))
}
