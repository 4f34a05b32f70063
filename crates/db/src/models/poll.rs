//! Poll row model.

use liveclass_core::poll::{Poll, PollOption, PollResults, PollSettings, TextResponse};
use liveclass_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

use super::text_to_enum;
use crate::error::{StoreError, StoreResult};

/// A row from the `polls` table.
#[derive(Debug, Clone, FromRow)]
pub struct PollRow {
    pub id: DbId,
    pub session_id: DbId,
    pub created_by: DbId,
    pub question: String,
    pub poll_type: String,
    pub options: Json<Vec<PollOption>>,
    pub text_responses: Json<Vec<TextResponse>>,
    pub settings: Json<PollSettings>,
    pub is_active: bool,
    pub is_anonymous: bool,
    pub expires_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub results: Json<PollResults>,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<PollRow> for Poll {
    type Error = StoreError;

    fn try_from(row: PollRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            session_id: row.session_id,
            created_by: row.created_by,
            question: row.question,
            poll_type: text_to_enum("poll_type", &row.poll_type)?,
            options: row.options.0,
            text_responses: row.text_responses.0,
            settings: row.settings.0,
            is_active: row.is_active,
            is_anonymous: row.is_anonymous,
            expires_at: row.expires_at,
            closed_at: row.closed_at,
            results: row.results.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
