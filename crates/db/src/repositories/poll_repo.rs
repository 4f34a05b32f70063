//! Repository for the `polls` table.

use async_trait::async_trait;
use liveclass_core::poll::Poll;
use liveclass_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::error::{classify_insert_error, StoreResult};
use crate::models::enum_to_text;
use crate::models::poll::PollRow;
use crate::store::{DocumentStore, PollStore};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, session_id, created_by, question, poll_type, options, \
                       text_responses, settings, is_active, is_anonymous, expires_at, \
                       closed_at, results, version, created_at, updated_at";

/// Versioned document access to polls.
pub struct PollRepo {
    pool: PgPool,
}

impl PollRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore<Poll> for PollRepo {
    async fn get(&self, id: DbId) -> StoreResult<Option<Poll>> {
        let query = format!("SELECT {COLUMNS} FROM polls WHERE id = $1");
        sqlx::query_as::<_, PollRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Poll::try_from)
            .transpose()
    }

    async fn insert(&self, doc: &Poll) -> StoreResult<Poll> {
        let query = format!(
            "INSERT INTO polls
                (session_id, created_by, question, poll_type, options, text_responses,
                 settings, is_active, is_anonymous, expires_at, closed_at, results, version,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 1, $13, $14)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, PollRow>(&query)
            .bind(doc.session_id)
            .bind(doc.created_by)
            .bind(&doc.question)
            .bind(enum_to_text(&doc.poll_type)?)
            .bind(Json(doc.options.clone()))
            .bind(Json(doc.text_responses.clone()))
            .bind(Json(doc.settings.clone()))
            .bind(doc.is_active)
            .bind(doc.is_anonymous)
            .bind(doc.expires_at)
            .bind(doc.closed_at)
            .bind(Json(doc.results.clone()))
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(classify_insert_error)?;
        Poll::try_from(row)
    }

    async fn replace(&self, doc: &Poll) -> StoreResult<Option<Poll>> {
        let query = format!(
            "UPDATE polls SET
                question = $3, options = $4, text_responses = $5, settings = $6,
                is_active = $7, is_anonymous = $8, expires_at = $9, closed_at = $10,
                results = $11, updated_at = $12, version = version + 1
             WHERE id = $1 AND version = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PollRow>(&query)
            .bind(doc.id)
            .bind(doc.version)
            .bind(&doc.question)
            .bind(Json(doc.options.clone()))
            .bind(Json(doc.text_responses.clone()))
            .bind(Json(doc.settings.clone()))
            .bind(doc.is_active)
            .bind(doc.is_anonymous)
            .bind(doc.expires_at)
            .bind(doc.closed_at)
            .bind(Json(doc.results.clone()))
            .bind(doc.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .map(Poll::try_from)
            .transpose()
    }
}

#[async_trait]
impl PollStore for PollRepo {
    async fn list_by_session(&self, session_id: DbId) -> StoreResult<Vec<Poll>> {
        let query = format!(
            "SELECT {COLUMNS} FROM polls WHERE session_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, PollRow>(&query)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Poll::try_from)
            .collect()
    }

    async fn delete(&self, id: DbId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
