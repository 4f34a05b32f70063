//! Chat engine: in-session messages, reactions and read receipts.

use std::sync::Arc;

use chrono::Utc;
use liveclass_core::attendance::EngagementKind;
use liveclass_core::chat::{ChatMessage, MessageType};
use liveclass_core::error::CoreError;
use liveclass_core::realtime::{events, session_room};
use liveclass_core::roles::Principal;
use liveclass_core::session::ClassSession;
use liveclass_core::types::DbId;
use liveclass_db::Datastore;
use liveclass_events::Broadcaster;
use serde_json::json;

use super::{best_effort, load, modify, AttendanceEngine};
use crate::error::AppResult;
use crate::query::PaginationParams;

#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub content: String,
    pub message_type: MessageType,
    pub reply_to: Option<DbId>,
}

pub struct ChatEngine {
    store: Datastore,
    broadcaster: Arc<dyn Broadcaster>,
    attendance: AttendanceEngine,
}

impl ChatEngine {
    pub fn new(
        store: Datastore,
        broadcaster: Arc<dyn Broadcaster>,
        attendance: AttendanceEngine,
    ) -> Self {
        Self {
            store,
            broadcaster,
            attendance,
        }
    }

    pub async fn send(
        &self,
        actor: &Principal,
        session_id: DbId,
        message: OutgoingMessage,
    ) -> AppResult<ChatMessage> {
        let session = self.load_session(session_id).await?;
        session.ensure_participant(actor)?;
        if !session.settings.enable_chat {
            return Err(CoreError::InvalidState("Chat is disabled for this session".into()).into());
        }
        if session.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "Cannot send messages in a {} session",
                session.status
            ))
            .into());
        }

        if let Some(parent_id) = message.reply_to {
            let parent = self.store.messages.get(parent_id).await?;
            if !parent.is_some_and(|p| p.session_id == session_id) {
                return Err(CoreError::Validation(
                    "reply_to must reference a message in this session".into(),
                )
                .into());
            }
        }

        let draft = ChatMessage::new(
            session_id,
            actor,
            &message.content,
            message.message_type,
            message.reply_to,
            Utc::now(),
        )?;
        let saved = self.store.messages.insert(&draft).await?;

        if actor.is_student() {
            self.count_engagement(session_id, actor.user_id, EngagementKind::Message)
                .await;
            if saved.message_type == MessageType::Question {
                self.count_engagement(session_id, actor.user_id, EngagementKind::Question)
                    .await;
            }
        }

        self.broadcaster.publish(
            &session_room(session_id),
            events::NEW_MESSAGE,
            json!(saved),
        );
        tracing::debug!(
            message_id = saved.id,
            session_id,
            user_id = actor.user_id,
            message_type = ?saved.message_type,
            "Message sent"
        );
        Ok(saved)
    }

    pub async fn edit(
        &self,
        actor: &Principal,
        message_id: DbId,
        content: &str,
    ) -> AppResult<ChatMessage> {
        let (saved, ()) = modify(
            &*self.store.messages,
            "Message",
            message_id,
            |m: &mut ChatMessage| m.edit(actor.user_id, content, Utc::now()),
        )
        .await?;

        self.broadcaster.publish(
            &session_room(saved.session_id),
            events::MESSAGE_EDITED,
            json!({
                "message_id": saved.id,
                "content": saved.content,
                "is_edited": saved.is_edited,
                "edited_at": saved.edited_at,
            }),
        );
        tracing::debug!(message_id, user_id = actor.user_id, "Message edited");
        Ok(saved)
    }

    pub async fn delete(&self, actor: &Principal, message_id: DbId) -> AppResult<ChatMessage> {
        let (saved, ()) = modify(
            &*self.store.messages,
            "Message",
            message_id,
            |m: &mut ChatMessage| m.delete(actor.user_id, Utc::now()),
        )
        .await?;

        self.broadcaster.publish(
            &session_room(saved.session_id),
            events::MESSAGE_DELETED,
            json!({ "message_id": saved.id }),
        );
        tracing::debug!(message_id, user_id = actor.user_id, "Message deleted");
        Ok(saved)
    }

    pub async fn add_reaction(
        &self,
        actor: &Principal,
        message_id: DbId,
        emoji: &str,
    ) -> AppResult<ChatMessage> {
        self.ensure_can_see(actor, message_id).await?;
        let (saved, added) = modify(
            &*self.store.messages,
            "Message",
            message_id,
            |m: &mut ChatMessage| m.add_reaction(actor.user_id, emoji, Utc::now()),
        )
        .await?;

        if added {
            if actor.is_student() {
                self.count_engagement(saved.session_id, actor.user_id, EngagementKind::Reaction)
                    .await;
            }
            self.publish_reactions(&saved);
        }
        Ok(saved)
    }

    pub async fn remove_reaction(
        &self,
        actor: &Principal,
        message_id: DbId,
        emoji: &str,
    ) -> AppResult<ChatMessage> {
        self.ensure_can_see(actor, message_id).await?;
        let (saved, removed) = modify(
            &*self.store.messages,
            "Message",
            message_id,
            |m: &mut ChatMessage| m.remove_reaction(actor.user_id, emoji, Utc::now()),
        )
        .await?;

        if removed {
            self.publish_reactions(&saved);
        }
        Ok(saved)
    }

    /// Non-deleted messages of a session, newest first.
    pub async fn list_messages(
        &self,
        actor: &Principal,
        session_id: DbId,
        page: &PaginationParams,
    ) -> AppResult<Vec<ChatMessage>> {
        let session = self.load_session(session_id).await?;
        session.ensure_participant(actor)?;
        Ok(self
            .store
            .messages
            .list_by_session(session_id, page.limit(), page.offset())
            .await?)
    }

    pub async fn mark_read(&self, actor: &Principal, message_id: DbId) -> AppResult<ChatMessage> {
        let message = self.ensure_can_see(actor, message_id).await?;
        if message.read_by.iter().any(|r| r.user_id == actor.user_id) {
            return Ok(message);
        }
        let (saved, _) = modify(
            &*self.store.messages,
            "Message",
            message_id,
            |m: &mut ChatMessage| Ok(m.mark_read(actor.user_id, Utc::now())),
        )
        .await?;
        Ok(saved)
    }

    // ---------------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------------

    async fn load_session(&self, session_id: DbId) -> AppResult<ClassSession> {
        load(&*self.store.sessions, "Session", session_id).await
    }

    /// Load a message and check the actor participates in its session.
    async fn ensure_can_see(&self, actor: &Principal, message_id: DbId) -> AppResult<ChatMessage> {
        let message: ChatMessage = load(&*self.store.messages, "Message", message_id).await?;
        let session = self.load_session(message.session_id).await?;
        session.ensure_participant(actor)?;
        Ok(message)
    }

    async fn count_engagement(&self, session_id: DbId, student_id: DbId, kind: EngagementKind) {
        best_effort(
            self.attendance
                .update_engagement(session_id, student_id, kind, 1)
                .await,
            "chat_engagement",
        );
    }

    fn publish_reactions(&self, message: &ChatMessage) {
        self.broadcaster.publish(
            &session_room(message.session_id),
            events::REACTION_UPDATED,
            json!({
                "message_id": message.id,
                "reactions": message.reactions,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use liveclass_core::session::SessionAction;

    use super::*;
    use crate::engine::test_support::Fixture;
    use crate::error::AppError;

    fn text(content: &str) -> OutgoingMessage {
        OutgoingMessage {
            content: content.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_counts_engagement_and_broadcasts() {
        let fx = Fixture::new().await;
        let session = fx.live_session_with_student().await;
        fx.state.sessions.join(&fx.student, session.id).await.unwrap();
        let mut rx = fx.state.event_bus.subscribe();

        let question = OutgoingMessage {
            content: "  What is a page fault?  ".into(),
            message_type: MessageType::Question,
            reply_to: None,
        };
        let sent = fx.state.chat.send(&fx.student, session.id, question).await.unwrap();
        assert_eq!(sent.content, "What is a page fault?");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, events::NEW_MESSAGE);
        assert_eq!(event.payload["id"], sent.id);

        let mine = fx
            .state
            .attendance
            .my_attendance(&fx.student, session.id)
            .await
            .unwrap();
        assert_eq!(mine.engagement.messages_count, 1);
        assert_eq!(mine.engagement.questions_asked, 1);
        // 50 + 2 (message) + 3 (question)
        assert_eq!(mine.engagement.participation_score, 55);
    }

    #[tokio::test]
    async fn test_send_rules() {
        let fx = Fixture::new().await;
        let session = fx.live_session_with_student().await;

        let err = fx
            .state
            .chat
            .send(&fx.foreign_student, session.id, text("hi"))
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::NotEnrolled));

        let err = fx
            .state
            .chat
            .send(&fx.student, session.id, text("   "))
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::Validation(_)));

        let announcement = OutgoingMessage {
            content: "Quiz on Friday".into(),
            message_type: MessageType::Announcement,
            reply_to: None,
        };
        let err = fx
            .state
            .chat
            .send(&fx.student, session.id, announcement.clone())
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::Forbidden(_)));
        fx.state.chat.send(&fx.faculty, session.id, announcement).await.unwrap();

        fx.state
            .sessions
            .transition(&fx.faculty, session.id, SessionAction::End)
            .await
            .unwrap();
        let err = fx
            .state
            .chat
            .send(&fx.student, session.id, text("too late"))
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_reply_must_stay_in_session() {
        let fx = Fixture::new().await;
        let first = fx.live_session_with_student().await;
        let second = fx.live_session_with_student().await;
        let parent = fx.state.chat.send(&fx.student, first.id, text("parent")).await.unwrap();

        let reply = OutgoingMessage {
            content: "reply".into(),
            message_type: MessageType::Text,
            reply_to: Some(parent.id),
        };
        let err = fx
            .state
            .chat
            .send(&fx.student, second.id, reply.clone())
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::Validation(_)));

        let saved = fx.state.chat.send(&fx.other_student, first.id, reply).await.unwrap();
        assert_eq!(saved.reply_to, Some(parent.id));
    }

    #[tokio::test]
    async fn test_edit_and_delete_are_sender_only() {
        let fx = Fixture::new().await;
        let session = fx.live_session_with_student().await;
        let sent = fx.state.chat.send(&fx.student, session.id, text("draft")).await.unwrap();

        let err = fx
            .state
            .chat
            .edit(&fx.other_student, sent.id, "hijacked")
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::Forbidden(_)));

        fx.state.chat.edit(&fx.student, sent.id, "second").await.unwrap();
        let edited = fx.state.chat.edit(&fx.student, sent.id, "third").await.unwrap();
        assert_eq!(edited.content, "third");
        assert_eq!(edited.original_message.as_deref(), Some("draft"));
        assert!(edited.is_edited);

        let mut rx = fx.state.event_bus.subscribe();
        let deleted = fx.state.chat.delete(&fx.student, sent.id).await.unwrap();
        assert!(deleted.is_deleted);
        assert_eq!(deleted.deleted_by, Some(fx.student.user_id));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, events::MESSAGE_DELETED);
        assert_eq!(event.payload, json!({ "message_id": sent.id }));

        let err = fx.state.chat.edit(&fx.student, sent.id, "again").await.unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::InvalidState(_)));

        let listed = fx
            .state
            .chat
            .list_messages(&fx.faculty, session.id, &PaginationParams::default())
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_reaction_add_add_remove_leaves_nothing() {
        let fx = Fixture::new().await;
        let session = fx.live_session_with_student().await;
        let sent = fx.state.chat.send(&fx.faculty, session.id, text("welcome")).await.unwrap();

        let once = fx.state.chat.add_reaction(&fx.student, sent.id, "👍").await.unwrap();
        let twice = fx.state.chat.add_reaction(&fx.student, sent.id, "👍").await.unwrap();
        assert_eq!(once.reaction_count("👍"), 1);
        assert_eq!(twice.reaction_count("👍"), 1);

        let removed = fx
            .state
            .chat
            .remove_reaction(&fx.student, sent.id, "👍")
            .await
            .unwrap();
        assert!(removed.reactions.is_empty());

        let err = fx
            .state
            .chat
            .add_reaction(&fx.foreign_student, sent.id, "👍")
            .await
            .unwrap_err();
        assert_matches!(err, AppError::Core(CoreError::NotEnrolled));
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let fx = Fixture::new().await;
        let session = fx.live_session_with_student().await;
        let sent = fx.state.chat.send(&fx.faculty, session.id, text("read me")).await.unwrap();

        let first = fx.state.chat.mark_read(&fx.student, sent.id).await.unwrap();
        let second = fx.state.chat.mark_read(&fx.student, sent.id).await.unwrap();
        assert_eq!(first.read_by.len(), 1);
        assert_eq!(second.read_by.len(), 1);
        assert_eq!(first.version, second.version);
    }
}
