//! In-session chat messages: sending rules, edits, soft deletes, reactions
//! and read receipts.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::Principal;
use crate::types::{DbId, Timestamp};

pub const MAX_MESSAGE_LENGTH: usize = 2000;
pub const MAX_EMOJI_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Question,
    /// Staff only.
    Announcement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub users: Vec<DbId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user_id: DbId,
    pub read_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: DbId,
    pub session_id: DbId,
    pub sender_id: DbId,
    pub content: String,
    pub message_type: MessageType,
    pub reply_to: Option<DbId>,
    pub reactions: Vec<Reaction>,
    pub read_by: Vec<ReadReceipt>,
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

/// Trim and length-check message content, returning the stored form.
pub fn validate_content(content: &str) -> Result<String, CoreError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Message must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Message exceeds maximum length of {MAX_MESSAGE_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_emoji(emoji: &str) -> Result<String, CoreError> {
    let trimmed = emoji.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_EMOJI_LENGTH {
        return Err(CoreError::Validation(format!(
            "Emoji must be 1 to {MAX_EMOJI_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

impl ChatMessage {
    /// Build an unsaved message. Participation and reply checks happen upstream.
    pub fn new(
        session_id: DbId,
        sender: &Principal,
        content: &str,
        message_type: MessageType,
        reply_to: Option<DbId>,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        let content = validate_content(content)?;
        if message_type == MessageType::Announcement && !sender.is_staff() {
            return Err(CoreError::Forbidden(
                "Only faculty and admins can post announcements".into(),
            ));
        }
        Ok(Self {
            id: 0,
            session_id,
            sender_id: sender.user_id,
            content,
            message_type,
            reply_to,
            reactions: Vec::new(),
            read_by: Vec::new(),
            is_edited: false,
            edited_at: None,
            original_message: None,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    fn ensure_sender(&self, user_id: DbId, verb: &str) -> Result<(), CoreError> {
        if self.sender_id == user_id {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "Only the sender can {verb} this message"
            )))
        }
    }

    fn ensure_not_deleted(&self) -> Result<(), CoreError> {
        if self.is_deleted {
            Err(CoreError::InvalidState("Message has been deleted".into()))
        } else {
            Ok(())
        }
    }

    /// Replace the content. The first original text is kept across edits.
    pub fn edit(&mut self, user_id: DbId, content: &str, now: Timestamp) -> Result<(), CoreError> {
        self.ensure_sender(user_id, "edit")?;
        self.ensure_not_deleted()?;
        let content = validate_content(content)?;

        if self.original_message.is_none() {
            self.original_message = Some(std::mem::take(&mut self.content));
        }
        self.content = content;
        self.is_edited = true;
        self.edited_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Soft delete.
    pub fn delete(&mut self, user_id: DbId, now: Timestamp) -> Result<(), CoreError> {
        self.ensure_sender(user_id, "delete")?;
        self.ensure_not_deleted()?;
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.deleted_by = Some(user_id);
        self.updated_at = now;
        Ok(())
    }

    /// Add a reaction. Returns `false` if the user already reacted with it.
    pub fn add_reaction(
        &mut self,
        user_id: DbId,
        emoji: &str,
        now: Timestamp,
    ) -> Result<bool, CoreError> {
        self.ensure_not_deleted()?;
        let emoji = validate_emoji(emoji)?;

        let added = match self.reactions.iter_mut().find(|r| r.emoji == emoji) {
            Some(reaction) if reaction.users.contains(&user_id) => false,
            Some(reaction) => {
                reaction.users.push(user_id);
                true
            }
            None => {
                self.reactions.push(Reaction {
                    emoji,
                    users: vec![user_id],
                });
                true
            }
        };
        if added {
            self.updated_at = now;
        }
        Ok(added)
    }

    /// Remove a reaction; an emoji left with no users is dropped.
    /// Returns `false` if there was nothing to remove.
    pub fn remove_reaction(
        &mut self,
        user_id: DbId,
        emoji: &str,
        now: Timestamp,
    ) -> Result<bool, CoreError> {
        self.ensure_not_deleted()?;
        let emoji = validate_emoji(emoji)?;

        let Some(reaction) = self.reactions.iter_mut().find(|r| r.emoji == emoji) else {
            return Ok(false);
        };
        let before = reaction.users.len();
        reaction.users.retain(|u| *u != user_id);
        let removed = reaction.users.len() != before;
        self.reactions.retain(|r| !r.users.is_empty());
        if removed {
            self.updated_at = now;
        }
        Ok(removed)
    }

    /// Record a read receipt. Returns `false` if the user had already read it.
    pub fn mark_read(&mut self, user_id: DbId, now: Timestamp) -> bool {
        if self.read_by.iter().any(|r| r.user_id == user_id) {
            return false;
        }
        self.read_by.push(ReadReceipt {
            user_id,
            read_at: now,
        });
        self.updated_at = now;
        true
    }

    pub fn reaction_count(&self, emoji: &str) -> usize {
        self.reactions
            .iter()
            .find(|r| r.emoji == emoji)
            .map_or(0, |r| r.users.len())
    }
}
