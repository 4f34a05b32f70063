//! Attendance row model.

use liveclass_core::attendance::{
    ActivityMonitoring, Alert, Attendance, CalculatedScores, Engagement, Location,
};
use liveclass_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

use super::text_to_enum;
use crate::error::{StoreError, StoreResult};

/// A row from the `attendance` table.
#[derive(Debug, Clone, FromRow)]
pub struct AttendanceRow {
    pub id: DbId,
    pub session_id: DbId,
    pub student_id: DbId,
    pub location: Option<Json<Location>>,
    pub join_time: Option<Timestamp>,
    pub leave_time: Option<Timestamp>,
    pub total_duration: i64,
    pub activity_monitoring: Json<ActivityMonitoring>,
    pub engagement: Json<Engagement>,
    pub alerts: Json<Vec<Alert>>,
    pub calculated: Json<CalculatedScores>,
    pub status: String,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<AttendanceRow> for Attendance {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            session_id: row.session_id,
            student_id: row.student_id,
            location: row.location.map(|l| l.0),
            join_time: row.join_time,
            leave_time: row.leave_time,
            total_duration: row.total_duration,
            activity_monitoring: row.activity_monitoring.0,
            engagement: row.engagement.0,
            alerts: row.alerts.0,
            calculated: row.calculated.0,
            status: text_to_enum("status", &row.status)?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Aggregate row produced by the attendance summary query.
#[derive(Debug, Clone, FromRow)]
pub struct AttendanceAggregateRow {
    pub total_records: i64,
    pub average_behavior_score: Option<f64>,
    pub average_participation_score: Option<f64>,
    pub unresolved_alerts: Option<i64>,
    pub at_risk: i64,
}

/// One `(status, count)` pair from the summary's status breakdown.
#[derive(Debug, Clone, FromRow)]
pub struct StatusCountRow {
    pub status: String,
    pub count: i64,
}
