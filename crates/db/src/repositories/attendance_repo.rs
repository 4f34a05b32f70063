//! Repository for the `attendance` table.

use std::collections::BTreeMap;

use async_trait::async_trait;
use liveclass_core::attendance::{Attendance, AttendanceSummary};
use liveclass_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::error::{classify_insert_error, StoreResult};
use crate::models::attendance::{AttendanceAggregateRow, AttendanceRow, StatusCountRow};
use crate::models::enum_to_text;
use crate::store::{AttendanceStore, DocumentStore};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, session_id, student_id, location, join_time, leave_time, \
                       total_duration, activity_monitoring, engagement, alerts, calculated, \
                       status, version, created_at, updated_at";

/// Versioned document access to attendance records.
///
/// `(session_id, student_id)` is unique (`uq_attendance_session_student`);
/// a concurrent first insert surfaces as `StoreError::Duplicate`.
pub struct AttendanceRepo {
    pool: PgPool,
}

impl AttendanceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore<Attendance> for AttendanceRepo {
    async fn get(&self, id: DbId) -> StoreResult<Option<Attendance>> {
        let query = format!("SELECT {COLUMNS} FROM attendance WHERE id = $1");
        sqlx::query_as::<_, AttendanceRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Attendance::try_from)
            .transpose()
    }

    async fn insert(&self, doc: &Attendance) -> StoreResult<Attendance> {
        let query = format!(
            "INSERT INTO attendance
                (session_id, student_id, location, join_time, leave_time, total_duration,
                 activity_monitoring, engagement, alerts, calculated, status, version,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 1, $12, $13)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, AttendanceRow>(&query)
            .bind(doc.session_id)
            .bind(doc.student_id)
            .bind(doc.location.clone().map(Json))
            .bind(doc.join_time)
            .bind(doc.leave_time)
            .bind(doc.total_duration)
            .bind(Json(doc.activity_monitoring.clone()))
            .bind(Json(doc.engagement.clone()))
            .bind(Json(doc.alerts.clone()))
            .bind(Json(doc.calculated.clone()))
            .bind(enum_to_text(&doc.status)?)
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(classify_insert_error)?;
        Attendance::try_from(row)
    }

    async fn replace(&self, doc: &Attendance) -> StoreResult<Option<Attendance>> {
        let query = format!(
            "UPDATE attendance SET
                location = $3, join_time = $4, leave_time = $5, total_duration = $6,
                activity_monitoring = $7, engagement = $8, alerts = $9, calculated = $10,
                status = $11, updated_at = $12, version = version + 1
             WHERE id = $1 AND version = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceRow>(&query)
            .bind(doc.id)
            .bind(doc.version)
            .bind(doc.location.clone().map(Json))
            .bind(doc.join_time)
            .bind(doc.leave_time)
            .bind(doc.total_duration)
            .bind(Json(doc.activity_monitoring.clone()))
            .bind(Json(doc.engagement.clone()))
            .bind(Json(doc.alerts.clone()))
            .bind(Json(doc.calculated.clone()))
            .bind(enum_to_text(&doc.status)?)
            .bind(doc.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .map(Attendance::try_from)
            .transpose()
    }
}

#[async_trait]
impl AttendanceStore for AttendanceRepo {
    async fn find(&self, session_id: DbId, student_id: DbId) -> StoreResult<Option<Attendance>> {
        let query =
            format!("SELECT {COLUMNS} FROM attendance WHERE session_id = $1 AND student_id = $2");
        sqlx::query_as::<_, AttendanceRow>(&query)
            .bind(session_id)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Attendance::try_from)
            .transpose()
    }

    async fn list_by_session(&self, session_id: DbId) -> StoreResult<Vec<Attendance>> {
        let query = format!("SELECT {COLUMNS} FROM attendance WHERE session_id = $1 ORDER BY id");
        sqlx::query_as::<_, AttendanceRow>(&query)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Attendance::try_from)
            .collect()
    }

    async fn summary(&self, session_id: DbId) -> StoreResult<AttendanceSummary> {
        let aggregate = sqlx::query_as::<_, AttendanceAggregateRow>(
            "SELECT COUNT(*) AS total_records,
                    AVG((calculated->>'behavior_score')::FLOAT8) AS average_behavior_score,
                    AVG((engagement->>'participation_score')::FLOAT8) AS average_participation_score,
                    SUM((SELECT COUNT(*) FROM jsonb_array_elements(alerts) a
                         WHERE NOT (a->>'is_resolved')::BOOLEAN))::BIGINT AS unresolved_alerts,
                    COUNT(*) FILTER (WHERE calculated->>'risk_level' IN ('high', 'critical'))
                        AS at_risk
             FROM attendance
             WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        let statuses = sqlx::query_as::<_, StatusCountRow>(
            "SELECT status, COUNT(*) AS count
             FROM attendance
             WHERE session_id = $1
             GROUP BY status",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(AttendanceSummary {
            total_records: aggregate.total_records,
            by_status: statuses
                .into_iter()
                .map(|row| (row.status, row.count))
                .collect::<BTreeMap<_, _>>(),
            average_behavior_score: aggregate.average_behavior_score.unwrap_or(0.0),
            average_participation_score: aggregate.average_participation_score.unwrap_or(0.0),
            unresolved_alerts: aggregate.unresolved_alerts.unwrap_or(0),
            at_risk: aggregate.at_risk,
        })
    }
}
