//! Repository for the `class_sessions` table.

use async_trait::async_trait;
use liveclass_core::session::ClassSession;
use liveclass_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::error::{classify_insert_error, StoreResult};
use crate::models::class_session::ClassSessionRow;
use crate::models::enum_to_text;
use crate::store::{DocumentStore, SessionFilter, SessionStore};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, title, description, subject, faculty_id, college_id, \
                       scheduled_start, scheduled_end, duration_minutes, status, is_active, \
                       actual_start_time, actual_end_time, roster, settings, analytics, \
                       version, created_at, updated_at";

/// Versioned document access to class sessions.
pub struct SessionRepo {
    pool: PgPool,
}

impl SessionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_all(rows: Vec<ClassSessionRow>) -> StoreResult<Vec<ClassSession>> {
    rows.into_iter().map(ClassSession::try_from).collect()
}

#[async_trait]
impl DocumentStore<ClassSession> for SessionRepo {
    async fn get(&self, id: DbId) -> StoreResult<Option<ClassSession>> {
        let query = format!("SELECT {COLUMNS} FROM class_sessions WHERE id = $1");
        sqlx::query_as::<_, ClassSessionRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(ClassSession::try_from)
            .transpose()
    }

    async fn insert(&self, doc: &ClassSession) -> StoreResult<ClassSession> {
        let query = format!(
            "INSERT INTO class_sessions
                (title, description, subject, faculty_id, college_id, scheduled_start,
                 scheduled_end, duration_minutes, status, is_active, actual_start_time,
                 actual_end_time, roster, settings, analytics, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 1, $16, $17)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ClassSessionRow>(&query)
            .bind(&doc.title)
            .bind(&doc.description)
            .bind(&doc.subject)
            .bind(doc.faculty_id)
            .bind(doc.college_id)
            .bind(doc.scheduled_start)
            .bind(doc.scheduled_end)
            .bind(doc.duration_minutes)
            .bind(enum_to_text(&doc.status)?)
            .bind(doc.is_active)
            .bind(doc.actual_start_time)
            .bind(doc.actual_end_time)
            .bind(Json(doc.roster.clone()))
            .bind(Json(doc.settings.clone()))
            .bind(Json(doc.analytics.clone()))
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(classify_insert_error)?;
        ClassSession::try_from(row)
    }

    async fn replace(&self, doc: &ClassSession) -> StoreResult<Option<ClassSession>> {
        let query = format!(
            "UPDATE class_sessions SET
                title = $3, description = $4, subject = $5, scheduled_start = $6,
                scheduled_end = $7, duration_minutes = $8, status = $9, is_active = $10,
                actual_start_time = $11, actual_end_time = $12, roster = $13,
                settings = $14, analytics = $15, updated_at = $16,
                version = version + 1
             WHERE id = $1 AND version = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClassSessionRow>(&query)
            .bind(doc.id)
            .bind(doc.version)
            .bind(&doc.title)
            .bind(&doc.description)
            .bind(&doc.subject)
            .bind(doc.scheduled_start)
            .bind(doc.scheduled_end)
            .bind(doc.duration_minutes)
            .bind(enum_to_text(&doc.status)?)
            .bind(doc.is_active)
            .bind(doc.actual_start_time)
            .bind(doc.actual_end_time)
            .bind(Json(doc.roster.clone()))
            .bind(Json(doc.settings.clone()))
            .bind(Json(doc.analytics.clone()))
            .bind(doc.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .map(ClassSession::try_from)
            .transpose()
    }
}

#[async_trait]
impl SessionStore for SessionRepo {
    async fn list(&self, filter: &SessionFilter) -> StoreResult<Vec<ClassSession>> {
        let status = filter.status.as_ref().map(enum_to_text).transpose()?;
        let query = format!(
            "SELECT {COLUMNS} FROM class_sessions
             WHERE ($1::BIGINT IS NULL OR college_id = $1)
               AND ($2::BIGINT IS NULL OR faculty_id = $2)
               AND ($3::BIGINT IS NULL
                    OR roster @> jsonb_build_array(jsonb_build_object('student_id', $3::BIGINT)))
               AND ($4::TEXT IS NULL OR status = $4)
             ORDER BY scheduled_start DESC, id DESC
             LIMIT $5 OFFSET $6"
        );
        let rows = sqlx::query_as::<_, ClassSessionRow>(&query)
            .bind(filter.college_id)
            .bind(filter.faculty_id)
            .bind(filter.enrolled_student)
            .bind(status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;
        decode_all(rows)
    }
}
