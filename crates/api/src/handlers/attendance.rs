//! Handlers for attendance tracking and live monitoring.
//!
//! Students report their own activity and location; the owning faculty and
//! admins read the dashboard, raise and resolve alerts, and adjust
//! engagement counters.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use liveclass_core::attendance::{AlertType, EngagementKind, Severity};
use liveclass_core::types::DbId;

use crate::engine::ManualAlert;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireStaff;
use crate::response::DataResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Request bodies
   -------------------------------------------------------------------------- */

#[derive(Debug, Deserialize, Validate)]
pub struct ActivityRequest {
    #[validate(length(min = 1, max = 64))]
    pub activity_type: String,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LocationRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(range(min = 0.0))]
    pub accuracy: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AlertRequest {
    pub alert_type: AlertType,
    #[validate(length(min = 1, max = 1000))]
    pub details: String,
    pub severity: Option<Severity>,
    pub extra: Option<Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResolveAlertRequest {
    #[validate(length(max = 1000))]
    pub resolution: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EngagementRequest {
    pub kind: EngagementKind,
    #[serde(default = "default_delta")]
    #[validate(range(min = -100, max = 100))]
    pub delta: i32,
}

fn default_delta() -> i32 {
    1
}

/* --------------------------------------------------------------------------
   Student reports
   -------------------------------------------------------------------------- */

/// POST /sessions/{id}/attendance/activity
pub async fn record_activity(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<ActivityRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let receipt = state
        .attendance
        .record_activity(
            &auth.principal(),
            session_id,
            &input.activity_type,
            input.details,
        )
        .await?;
    Ok(Json(DataResponse { data: receipt }))
}

/// POST /sessions/{id}/attendance/location
pub async fn update_location(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
    Json(input): Json<LocationRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let record = state
        .attendance
        .update_location(
            &auth.principal(),
            session_id,
            input.latitude,
            input.longitude,
            input.address,
            input.accuracy,
        )
        .await?;
    Ok(Json(DataResponse { data: record }))
}

/// GET /sessions/{id}/attendance/me
pub async fn my_attendance(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let record = state
        .attendance
        .my_attendance(&auth.principal(), session_id)
        .await?;
    Ok(Json(DataResponse { data: record }))
}

/* --------------------------------------------------------------------------
   Monitoring
   -------------------------------------------------------------------------- */

/// GET /sessions/{id}/attendance/dashboard
pub async fn dashboard(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let rows = state
        .attendance
        .dashboard(&auth.principal(), session_id)
        .await?;
    Ok(Json(DataResponse { data: rows }))
}

/// GET /sessions/{id}/attendance/summary
pub async fn summary(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path(session_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let summary = state
        .attendance
        .summary(&auth.principal(), session_id)
        .await?;
    Ok(Json(DataResponse { data: summary }))
}

/// POST /sessions/{id}/attendance/{student_id}/alerts
pub async fn add_alert(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path((session_id, student_id)): Path<(DbId, DbId)>,
    Json(input): Json<AlertRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let alert = state
        .attendance
        .add_alert(
            &auth.principal(),
            session_id,
            student_id,
            ManualAlert {
                alert_type: input.alert_type,
                details: input.details,
                severity: input.severity,
                extra: input.extra,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: alert })))
}

/// POST /sessions/{id}/attendance/{student_id}/alerts/{alert_id}/resolve
pub async fn resolve_alert(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path((session_id, student_id, alert_id)): Path<(DbId, DbId, Uuid)>,
    Json(input): Json<ResolveAlertRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let alert = state
        .attendance
        .resolve_alert(
            &auth.principal(),
            session_id,
            student_id,
            alert_id,
            input.resolution,
        )
        .await?;
    Ok(Json(DataResponse { data: alert }))
}

/// POST /sessions/{id}/attendance/{student_id}/engagement
pub async fn adjust_engagement(
    RequireStaff(auth): RequireStaff,
    State(state): State<AppState>,
    Path((session_id, student_id)): Path<(DbId, DbId)>,
    Json(input): Json<EngagementRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let record = state
        .attendance
        .adjust_engagement(
            &auth.principal(),
            session_id,
            student_id,
            input.kind,
            input.delta,
        )
        .await?;
    Ok(Json(DataResponse { data: record }))
}
