//! Route definitions for attendance and monitoring.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::attendance;
use crate::state::AppState;

/// Session-scoped attendance routes, merged into `/sessions`.
///
/// ```text
/// GET    /{id}/attendance/me                                          my_attendance
/// GET    /{id}/attendance/dashboard                                   dashboard
/// GET    /{id}/attendance/summary                                     summary
/// POST   /{id}/attendance/activity                                    record_activity
/// POST   /{id}/attendance/location                                    update_location
/// POST   /{id}/attendance/{student_id}/alerts                         add_alert
/// POST   /{id}/attendance/{student_id}/alerts/{alert_id}/resolve      resolve_alert
/// POST   /{id}/attendance/{student_id}/engagement                     adjust_engagement
/// ```
pub fn session_router() -> Router<AppState> {
    Router::new()
        .route("/{id}/attendance/me", get(attendance::my_attendance))
        .route("/{id}/attendance/dashboard", get(attendance::dashboard))
        .route("/{id}/attendance/summary", get(attendance::summary))
        .route("/{id}/attendance/activity", post(attendance::record_activity))
        .route("/{id}/attendance/location", post(attendance::update_location))
        .route(
            "/{id}/attendance/{student_id}/alerts",
            post(attendance::add_alert),
        )
        .route(
            "/{id}/attendance/{student_id}/alerts/{alert_id}/resolve",
            post(attendance::resolve_alert),
        )
        .route(
            "/{id}/attendance/{student_id}/engagement",
            post(attendance::adjust_engagement),
        )
}
