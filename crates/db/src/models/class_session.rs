//! Class session row model.

use liveclass_core::session::{ClassSession, RosterEntry, SessionAnalytics, SessionSettings};
use liveclass_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

use super::text_to_enum;
use crate::error::{StoreError, StoreResult};

/// A row from the `class_sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct ClassSessionRow {
    pub id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub faculty_id: DbId,
    pub college_id: DbId,
    pub scheduled_start: Timestamp,
    pub scheduled_end: Option<Timestamp>,
    pub duration_minutes: i32,
    pub status: String,
    pub is_active: bool,
    pub actual_start_time: Option<Timestamp>,
    pub actual_end_time: Option<Timestamp>,
    pub roster: Json<Vec<RosterEntry>>,
    pub settings: Json<SessionSettings>,
    pub analytics: Json<SessionAnalytics>,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<ClassSessionRow> for ClassSession {
    type Error = StoreError;

    fn try_from(row: ClassSessionRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            subject: row.subject,
            faculty_id: row.faculty_id,
            college_id: row.college_id,
            scheduled_start: row.scheduled_start,
            scheduled_end: row.scheduled_end,
            duration_minutes: row.duration_minutes,
            status: text_to_enum("status", &row.status)?,
            is_active: row.is_active,
            actual_start_time: row.actual_start_time,
            actual_end_time: row.actual_end_time,
            roster: row.roster.0,
            settings: row.settings.0,
            analytics: row.analytics.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
