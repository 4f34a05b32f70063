//! Repository for the `chat_messages` table.

use async_trait::async_trait;
use liveclass_core::chat::ChatMessage;
use liveclass_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::error::{classify_insert_error, StoreResult};
use crate::models::chat_message::ChatMessageRow;
use crate::models::enum_to_text;
use crate::store::{DocumentStore, MessageStore};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, session_id, sender_id, content, message_type, reply_to, reactions, \
                       read_by, is_edited, edited_at, original_message, is_deleted, deleted_at, \
                       deleted_by, version, created_at, updated_at";

/// Versioned document access to chat messages.
pub struct MessageRepo {
    pool: PgPool,
}

impl MessageRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore<ChatMessage> for MessageRepo {
    async fn get(&self, id: DbId) -> StoreResult<Option<ChatMessage>> {
        let query = format!("SELECT {COLUMNS} FROM chat_messages WHERE id = $1");
        sqlx::query_as::<_, ChatMessageRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(ChatMessage::try_from)
            .transpose()
    }

    async fn insert(&self, doc: &ChatMessage) -> StoreResult<ChatMessage> {
        let query = format!(
            "INSERT INTO chat_messages
                (session_id, sender_id, content, message_type, reply_to, reactions, read_by,
                 is_edited, edited_at, original_message, is_deleted, deleted_at, deleted_by,
                 version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 1, $14, $15)
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ChatMessageRow>(&query)
            .bind(doc.session_id)
            .bind(doc.sender_id)
            .bind(&doc.content)
            .bind(enum_to_text(&doc.message_type)?)
            .bind(doc.reply_to)
            .bind(Json(doc.reactions.clone()))
            .bind(Json(doc.read_by.clone()))
            .bind(doc.is_edited)
            .bind(doc.edited_at)
            .bind(&doc.original_message)
            .bind(doc.is_deleted)
            .bind(doc.deleted_at)
            .bind(doc.deleted_by)
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(classify_insert_error)?;
        ChatMessage::try_from(row)
    }

    async fn replace(&self, doc: &ChatMessage) -> StoreResult<Option<ChatMessage>> {
        let query = format!(
            "UPDATE chat_messages SET
                content = $3, reactions = $4, read_by = $5, is_edited = $6, edited_at = $7,
                original_message = $8, is_deleted = $9, deleted_at = $10, deleted_by = $11,
                updated_at = $12, version = version + 1
             WHERE id = $1 AND version = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChatMessageRow>(&query)
            .bind(doc.id)
            .bind(doc.version)
            .bind(&doc.content)
            .bind(Json(doc.reactions.clone()))
            .bind(Json(doc.read_by.clone()))
            .bind(doc.is_edited)
            .bind(doc.edited_at)
            .bind(&doc.original_message)
            .bind(doc.is_deleted)
            .bind(doc.deleted_at)
            .bind(doc.deleted_by)
            .bind(doc.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .map(ChatMessage::try_from)
            .transpose()
    }
}

#[async_trait]
impl MessageStore for MessageRepo {
    async fn list_by_session(
        &self,
        session_id: DbId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ChatMessage>> {
        let query = format!(
            "SELECT {COLUMNS} FROM chat_messages
             WHERE session_id = $1 AND is_deleted = false
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ChatMessageRow>(&query)
            .bind(session_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ChatMessage::try_from)
            .collect()
    }
}
