//! Session lifecycle engine: scheduling, state transitions and the roster.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use liveclass_core::error::CoreError;
use liveclass_core::realtime::{events, session_room};
use liveclass_core::roles::{Principal, Role};
use liveclass_core::session::{
    ClassSession, EnrollOutcome, JoinOutcome, NewSession, SessionAction, SessionStatus,
    SessionUpdate,
};
use liveclass_core::types::{DbId, Timestamp};
use liveclass_db::{Datastore, SessionFilter};
use liveclass_events::Broadcaster;
use serde::Serialize;
use serde_json::json;

use super::{best_effort, load, modify, AttendanceEngine};
use crate::error::AppResult;
use crate::query::PaginationParams;

/// Outcome of a join request.
#[derive(Debug, Clone, Serialize)]
pub struct JoinReceipt {
    /// Staff watching the session without taking a roster seat.
    pub observing: bool,
    pub first_join: bool,
    pub present_count: usize,
    pub session: ClassSession,
}

pub struct SessionEngine {
    store: Datastore,
    broadcaster: Arc<dyn Broadcaster>,
    attendance: AttendanceEngine,
}

impl SessionEngine {
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

    // ---------------------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------------------

    pub async fn create(&self, actor: &Principal, input: NewSession) -> AppResult<ClassSession> {
        if !actor.is_staff() {
            return Err(CoreError::Forbidden("Only faculty can schedule sessions".into()).into());
        }
        let mut session = ClassSession::new(input, actor.user_id, actor.college_id, Utc::now())?;
        session.recompute_analytics();
        let saved = self.store.sessions.insert(&session).await?;

        tracing::info!(
            session_id = saved.id,
            faculty_id = actor.user_id,
            scheduled_start = %saved.scheduled_start,
            "Session scheduled"
        );
        Ok(saved)
    }

    pub async fn get(&self, actor: &Principal, session_id: DbId) -> AppResult<ClassSession> {
        let session = self.load(session_id).await?;
        session.ensure_participant(actor)?;
        Ok(session)
    }

    /// Sessions visible to the caller: the college for admins, owned
    /// sessions for faculty and enrolled sessions for students.
    pub async fn list(
        &self,
        actor: &Principal,
        status: Option<SessionStatus>,
        page: &PaginationParams,
    ) -> AppResult<Vec<ClassSession>> {
        let mut filter = SessionFilter {
            status,
            limit: page.limit(),
            offset: page.offset(),
            ..Default::default()
        };
        match actor.role {
            Role::Admin => filter.college_id = Some(actor.college_id),
            Role::Faculty => filter.faculty_id = Some(actor.user_id),
            Role::Student => filter.enrolled_student = Some(actor.user_id),
        }
        Ok(self.store.sessions.list(&filter).await?)
    }

    pub async fn update(
        &self,
        actor: &Principal,
        session_id: DbId,
        update: SessionUpdate,
    ) -> AppResult<ClassSession> {
        let (saved, ()) = self
            .modify_session(session_id, |s, now| s.apply_update(actor, update.clone(), now))
            .await?;

        self.broadcaster.publish(
            &session_room(session_id),
            events::SESSION_UPDATED,
            json!({
                "session_id": session_id,
                "title": saved.title,
                "subject": saved.subject,
                "scheduled_start": saved.scheduled_start,
                "scheduled_end": saved.scheduled_end,
                "duration_minutes": saved.duration_minutes,
                "settings": saved.settings,
            }),
        );
        tracing::info!(session_id, user_id = actor.user_id, "Session updated");
        Ok(saved)
    }

    // ---------------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------------

    /// Apply a lifecycle action and announce it to the session room.
    ///
    /// Ending a session also checks out every student still present, marks
    /// their attendance left and copies participation scores onto the roster.
    pub async fn transition(
        &self,
        actor: &Principal,
        session_id: DbId,
        action: SessionAction,
    ) -> AppResult<ClassSession> {
        let (saved, checked_out) = self
            .modify_session(session_id, |s, now| s.apply_action(action, actor, now))
            .await?;

        self.broadcaster.publish(
            &session_room(session_id),
            action.event_name(),
            json!({
                "session_id": session_id,
                "new_status": saved.status,
                "timestamp": saved.updated_at,
            }),
        );
        tracing::info!(
            session_id,
            user_id = actor.user_id,
            status = %saved.status,
            "Session {}",
            action.event_name()
        );

        if action == SessionAction::End {
            return Ok(self.finish_checkout(saved, &checked_out).await);
        }
        Ok(saved)
    }

    async fn finish_checkout(&self, session: ClassSession, checked_out: &[DbId]) -> ClassSession {
        for &student_id in checked_out {
            best_effort(
                self.attendance.mark_left(session.id, student_id).await,
                "mark_left_on_end",
            );
        }
        tracing::info!(
            session_id = session.id,
            checked_out = checked_out.len(),
            "Forced checkout complete"
        );

        let Some(scores) = best_effort(
            self.attendance.participation_scores(session.id).await,
            "load_participation_scores",
        ) else {
            return session;
        };
        if scores.is_empty() {
            return session;
        }

        let synced = self
            .modify_session(session.id, |s, _| {
                s.sync_participation(&scores);
                Ok(())
            })
            .await;
        match best_effort(synced, "sync_participation") {
            Some((saved, ())) => saved,
            None => session,
        }
    }

    // ---------------------------------------------------------------------------
    // Roster
    // ---------------------------------------------------------------------------

    pub async fn enroll(
        &self,
        actor: &Principal,
        session_id: DbId,
        student_ids: &[DbId],
    ) -> AppResult<EnrollOutcome> {
        if student_ids.is_empty() {
            return Err(CoreError::Validation("student_ids must not be empty".into()).into());
        }
        // Permission before any user lookup.
        self.load(session_id).await?.ensure_can_manage(actor)?;

        let users = self.store.users.find_many(student_ids).await?;
        let found: HashSet<DbId> = users.iter().map(|u| u.id).collect();
        if let Some(missing) = student_ids.iter().find(|id| !found.contains(id)) {
            return Err(CoreError::not_found("User", missing).into());
        }
        let mut candidates = Vec::with_capacity(users.len());
        for user in &users {
            if !user.is_active {
                return Err(CoreError::Forbidden(format!("User {} is inactive", user.id)).into());
            }
            let candidate = user.enroll_candidate().ok_or_else(|| {
                CoreError::Forbidden(format!("User {} has an unknown role", user.id))
            })?;
            candidates.push(candidate);
        }
        // Keep the caller's order (and duplicates) so repeats count as already enrolled.
        let ordered: Vec<_> = student_ids
            .iter()
            .filter_map(|id| candidates.iter().find(|c| c.user_id == *id).copied())
            .collect();

        let (saved, outcome) = self
            .modify_session(session_id, |s, now| s.enroll(actor, &ordered, now))
            .await?;

        self.broadcaster.publish(
            &session_room(session_id),
            events::STUDENTS_ENROLLED,
            json!({
                "session_id": session_id,
                "enrolled": outcome.enrolled,
                "already_enrolled": outcome.already_enrolled,
                "total_enrolled": saved.analytics.total_enrolled,
            }),
        );
        tracing::info!(
            session_id,
            user_id = actor.user_id,
            enrolled = outcome.enrolled,
            already_enrolled = outcome.already_enrolled,
            "Students enrolled"
        );
        Ok(outcome)
    }

    pub async fn join(&self, actor: &Principal, session_id: DbId) -> AppResult<JoinReceipt> {
        let session = self.load(session_id).await?;
        if session.can_manage(actor) {
            return Ok(JoinReceipt {
                observing: true,
                first_join: false,
                present_count: session.present_count(),
                session,
            });
        }

        let location_verified = if actor.is_student() && session.settings.require_location_verification
        {
            self.store
                .attendance
                .find(session_id, actor.user_id)
                .await?
                .is_some_and(|r| r.has_verified_location())
        } else {
            false
        };

        let (saved, outcome) = self
            .modify_session(session_id, |s, now| s.join(actor, location_verified, now))
            .await?;
        let first_join = matches!(outcome, JoinOutcome::Joined { first_join: true });

        best_effort(
            self.attendance.mark_joined(session_id, actor.user_id).await,
            "mark_joined",
        );

        let present_count = saved.present_count();
        self.broadcaster.publish(
            &session_room(session_id),
            events::STUDENT_JOINED,
            json!({
                "session_id": session_id,
                "student_id": actor.user_id,
                "first_join": first_join,
                "present_count": present_count,
                "max_concurrent_students": saved.analytics.max_concurrent_students,
            }),
        );
        tracing::info!(session_id, user_id = actor.user_id, first_join, "Student joined");

        Ok(JoinReceipt {
            observing: false,
            first_join,
            present_count,
            session: saved,
        })
    }

    pub async fn leave(&self, actor: &Principal, session_id: DbId) -> AppResult<ClassSession> {
        let session = self.load(session_id).await?;
        if session.can_manage(actor) {
            return Ok(session);
        }

        let (saved, _) = self
            .modify_session(session_id, |s, now| s.leave(actor, now))
            .await?;

        best_effort(
            self.attendance.mark_left(session_id, actor.user_id).await,
            "mark_left",
        );

        self.broadcaster.publish(
            &session_room(session_id),
            events::STUDENT_LEFT,
            json!({
                "session_id": session_id,
                "student_id": actor.user_id,
                "present_count": saved.present_count(),
            }),
        );
        tracing::info!(session_id, user_id = actor.user_id, "Student left");
        Ok(saved)
    }

    // ---------------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------------

    async fn load(&self, session_id: DbId) -> AppResult<ClassSession> {
        load(&*self.store.sessions, "Session", session_id).await
    }

    /// [`modify`] for sessions, recomputing analytics before each save.
    async fn modify_session<F, R>(&self, id: DbId, mut apply: F) -> AppResult<(ClassSession, R)>
    where
        F: FnMut(&mut ClassSession, Timestamp) -> Result<R, CoreError> + Send,
        R: Send,
    {
        modify(&*self.store.sessions, "Session", id, |session: &mut ClassSession| {
            let outcome = apply(session, Utc::now())?;
            session.recompute_analytics();
            Ok(outcome)
        })
        .await
    }
}
