//! Poll engine: creation, voting, closing and visibility-filtered reads.

use std::sync::Arc;

use chrono::Utc;
use liveclass_core::attendance::EngagementKind;
use liveclass_core::error::CoreError;
use liveclass_core::poll::{NewPoll, Poll, PollView, PollViewer};
use liveclass_core::realtime::{events, session_room};
use liveclass_core::roles::Principal;
use liveclass_core::session::ClassSession;
use liveclass_core::types::DbId;
use liveclass_db::Datastore;
use liveclass_events::Broadcaster;
use serde_json::json;

use super::{best_effort, load, modify, AttendanceEngine};
use crate::error::AppResult;

/// A vote on a choice poll or a text response, depending on the poll type.
#[derive(Debug, Clone, Default)]
pub struct VoteRequest {
    pub option_index: Option<i64>,
    pub text_response: Option<String>,
    /// Seconds the voter took to answer.
    pub response_time: Option<f64>,
}

pub struct PollEngine {
    store: Datastore,
    broadcaster: Arc<dyn Broadcaster>,
    attendance: AttendanceEngine,
}

impl PollEngine {
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

    pub async fn create(
        &self,
        actor: &Principal,
        session_id: DbId,
        input: NewPoll,
    ) -> AppResult<PollView> {
        let session = self.load_session(session_id).await?;
        session.ensure_can_manage(actor)?;
        if !session.settings.enable_polls {
            return Err(CoreError::InvalidState("Polls are disabled for this session".into()).into());
        }

        let poll = Poll::new(input, session_id, actor.user_id, Utc::now())?;
        let saved = self.store.polls.insert(&poll).await?;

        self.broadcaster.publish(
            &session_room(session_id),
            events::POLL_CREATED,
            json!({
                "poll_id": saved.id,
                "session_id": session_id,
                "question": saved.question,
                "poll_type": saved.poll_type,
                "options": saved.options.iter().map(|o| &o.text).collect::<Vec<_>>(),
                "is_anonymous": saved.is_anonymous,
                "expires_at": saved.expires_at,
                "settings": saved.settings,
            }),
        );
        tracing::info!(poll_id = saved.id, session_id, user_id = actor.user_id, "Poll created");
        Ok(saved.view_for(PollViewer::Manager))
    }

    /// Cast, move or submit a vote.
    ///
    /// The tally broadcast goes out on every accepted vote regardless of the
    /// poll's result-visibility setting.
    pub async fn vote(
        &self,
        actor: &Principal,
        poll_id: DbId,
        request: VoteRequest,
    ) -> AppResult<PollView> {
        let poll = self.close_if_expired(self.load(poll_id).await?).await?;
        poll.ensure_open(Utc::now())?;

        let session = self.load_session(poll.session_id).await?;
        if actor.is_student() && !session.is_enrolled(actor.user_id) {
            return Err(CoreError::NotEnrolled.into());
        }

        let (saved, outcome) = modify(&*self.store.polls, "Poll", poll_id, |p: &mut Poll| {
            let now = Utc::now();
            if p.poll_type.is_choice() {
                let index = request.option_index.ok_or_else(|| {
                    CoreError::Validation("option_index is required for this poll".into())
                })?;
                p.vote_choice(actor.user_id, index, request.response_time, now)
            } else {
                let text = request.text_response.as_deref().ok_or_else(|| {
                    CoreError::Validation("text_response is required for this poll".into())
                })?;
                p.respond_text(actor.user_id, text, now)
            }
        })
        .await?;

        if outcome.first_participation && actor.is_student() {
            best_effort(
                self.attendance
                    .update_engagement(saved.session_id, actor.user_id, EngagementKind::Poll, 1)
                    .await,
                "poll_engagement",
            );
        }

        self.broadcaster.publish(
            &session_room(saved.session_id),
            events::POLL_UPDATED,
            json!(saved.tally()),
        );
        tracing::info!(
            poll_id,
            user_id = actor.user_id,
            revote = !outcome.first_participation,
            total_votes = saved.results.total_votes,
            "Vote recorded"
        );

        Ok(saved.view_for(viewer(&session, &saved, actor)))
    }

    pub async fn close(&self, actor: &Principal, poll_id: DbId) -> AppResult<PollView> {
        let poll = self.load(poll_id).await?;
        let session = self.load_session(poll.session_id).await?;
        ensure_can_manage(&session, &poll, actor)?;

        let (saved, ()) = modify(&*self.store.polls, "Poll", poll_id, |p: &mut Poll| {
            p.close(Utc::now())
        })
        .await?;

        self.publish_closed(&saved);
        tracing::info!(poll_id, user_id = actor.user_id, "Poll closed");
        Ok(saved.view_for(PollViewer::Manager))
    }

    pub async fn get(&self, actor: &Principal, poll_id: DbId) -> AppResult<PollView> {
        let poll = self.load(poll_id).await?;
        let session = self.load_session(poll.session_id).await?;
        session.ensure_participant(actor)?;

        let poll = self.close_if_expired(poll).await?;
        Ok(poll.view_for(viewer(&session, &poll, actor)))
    }

    pub async fn list_for_session(
        &self,
        actor: &Principal,
        session_id: DbId,
    ) -> AppResult<Vec<PollView>> {
        let session = self.load_session(session_id).await?;
        session.ensure_participant(actor)?;

        let polls = self.store.polls.list_by_session(session_id).await?;
        let mut views = Vec::with_capacity(polls.len());
        for poll in polls {
            let poll = self.close_if_expired(poll).await?;
            views.push(poll.view_for(viewer(&session, &poll, actor)));
        }
        Ok(views)
    }

    pub async fn delete(&self, actor: &Principal, poll_id: DbId) -> AppResult<()> {
        let poll = self.load(poll_id).await?;
        let session = self.load_session(poll.session_id).await?;
        ensure_can_manage(&session, &poll, actor)?;

        if !self.store.polls.delete(poll_id).await? {
            return Err(CoreError::not_found("Poll", poll_id).into());
        }

        self.broadcaster.publish(
            &session_room(poll.session_id),
            events::POLL_DELETED,
            json!({ "poll_id": poll_id }),
        );
        tracing::info!(poll_id, user_id = actor.user_id, "Poll deleted");
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------------

    async fn load(&self, poll_id: DbId) -> AppResult<Poll> {
        load(&*self.store.polls, "Poll", poll_id).await
    }

    async fn load_session(&self, session_id: DbId) -> AppResult<ClassSession> {
        load(&*self.store.sessions, "Session", session_id).await
    }

    /// Persist the implicit close of a poll whose expiry has passed.
    async fn close_if_expired(&self, poll: Poll) -> AppResult<Poll> {
        if !(poll.is_active && poll.is_expired(Utc::now())) {
            return Ok(poll);
        }
        let (saved, closed) = modify(&*self.store.polls, "Poll", poll.id, |p: &mut Poll| {
            Ok(p.close_if_expired(Utc::now()))
        })
        .await?;
        if closed {
            self.publish_closed(&saved);
            tracing::info!(poll_id = saved.id, "Expired poll closed");
        }
        Ok(saved)
    }

    fn publish_closed(&self, poll: &Poll) {
        self.broadcaster.publish(
            &session_room(poll.session_id),
            events::POLL_CLOSED,
            json!({
                "poll_id": poll.id,
                "closed_at": poll.closed_at,
                "results": poll.tally(),
            }),
        );
    }
}

fn viewer(session: &ClassSession, poll: &Poll, actor: &Principal) -> PollViewer {
    if session.can_manage(actor) || poll.created_by == actor.user_id {
        PollViewer::Manager
    } else {
        PollViewer::Participant(actor.user_id)
    }
}

fn ensure_can_manage(session: &ClassSession, poll: &Poll, actor: &Principal) -> AppResult<()> {
    if poll.created_by == actor.user_id {
        return Ok(());
    }
    Ok(session.ensure_can_manage(actor)?)
}
