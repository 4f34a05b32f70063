//! Chat message row model.

use liveclass_core::chat::{ChatMessage, Reaction, ReadReceipt};
use liveclass_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

use super::text_to_enum;
use crate::error::{StoreError, StoreResult};

/// A row from the `chat_messages` table.
#[derive(Debug, Clone, FromRow)]
pub struct ChatMessageRow {
    pub id: DbId,
    pub session_id: DbId,
    pub sender_id: DbId,
    pub content: String,
    pub message_type: String,
    pub reply_to: Option<DbId>,
    pub reactions: Json<Vec<Reaction>>,
    pub read_by: Json<Vec<ReadReceipt>>,
    pub is_edited: bool,
    pub edited_at: Option<Timestamp>,
    pub original_message: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<Timestamp>,
    pub deleted_by: Option<DbId>,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<ChatMessageRow> for ChatMessage {
    type Error = StoreError;

    fn try_from(row: ChatMessageRow) -> StoreResult<Self> {
        Ok(Self {
            id: row.id,
            session_id: row.session_id,
            sender_id: row.sender_id,
            content: row.content,
            message_type: text_to_enum("message_type", &row.message_type)?,
            reply_to: row.reply_to,
            reactions: row.reactions.0,
            read_by: row.read_by.0,
            is_edited: row.is_edited,
            edited_at: row.edited_at,
            original_message: row.original_message,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            deleted_by: row.deleted_by,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
