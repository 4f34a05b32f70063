//! Attendance & monitoring engine.
//!
//! Owns the per-student attendance documents: activity reports, location
//! checks, manual alerts, engagement counters and the faculty dashboard.
//! Alerts are pushed to the session's monitor room, which only the owning
//! faculty and admins may subscribe to.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use liveclass_core::attendance::{
    dashboard_rows, ActivityType, Alert, AlertType, Attendance, AttendanceStatus,
    AttendanceSummary, CalculatedScores, DashboardEntry, EngagementKind, Severity,
};
use liveclass_core::error::CoreError;
use liveclass_core::geo::validate_coordinates;
use liveclass_core::realtime::{events, monitor_room};
use liveclass_core::roles::Principal;
use liveclass_core::session::ClassSession;
use liveclass_core::types::{DbId, Timestamp};
use liveclass_db::{Datastore, StoreError};
use liveclass_events::Broadcaster;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{load, modify};
use crate::error::{AppError, AppResult};

/// Result of an activity report.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityReceipt {
    pub activity_type: String,
    /// `true` when the activity type is unknown and nothing was recorded.
    pub ignored: bool,
    pub status: Option<AttendanceStatus>,
    pub calculated: Option<CalculatedScores>,
    /// The alert raised by this report, if any.
    pub alert: Option<Alert>,
}

/// A faculty-raised flag on a student.
#[derive(Debug, Clone)]
pub struct ManualAlert {
    pub alert_type: AlertType,
    pub details: String,
    /// Defaults to the alert type's standard severity.
    pub severity: Option<Severity>,
    pub extra: Option<Value>,
}

#[derive(Clone)]
pub struct AttendanceEngine {
    store: Datastore,
    broadcaster: Arc<dyn Broadcaster>,
}

impl AttendanceEngine {
    pub fn new(store: Datastore, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    // ---------------------------------------------------------------------------
    // Student-reported events
    // ---------------------------------------------------------------------------

    /// Record a client-reported activity event for the calling student.
    pub async fn record_activity(
        &self,
        actor: &Principal,
        session_id: DbId,
        activity_type: &str,
        details: Value,
    ) -> AppResult<ActivityReceipt> {
        ensure_student(actor, "report activity")?;
        let record = self.require_record(session_id, actor.user_id).await?;

        let Some(activity) = ActivityType::parse(activity_type) else {
            tracing::warn!(
                session_id,
                user_id = actor.user_id,
                activity_type,
                "Ignoring unknown activity type"
            );
            return Ok(ActivityReceipt {
                activity_type: activity_type.to_string(),
                ignored: true,
                status: None,
                calculated: None,
                alert: None,
            });
        };

        let (saved, alert_id) = self
            .modify_record(record.id, |r, now| Ok(r.record_activity(activity, &details, now)))
            .await?;

        let alert = alert_id.and_then(|id| saved.alert(id).cloned());
        if let Some(alert) = &alert {
            self.publish_alert(&saved, alert);
        }

        tracing::debug!(
            session_id,
            user_id = actor.user_id,
            activity_type,
            status = %saved.status,
            "Activity recorded"
        );

        Ok(ActivityReceipt {
            activity_type: activity_type.to_string(),
            ignored: false,
            status: Some(saved.status),
            calculated: Some(saved.calculated.clone()),
            alert,
        })
    }

    /// Store the calling student's location, alerting on large moves.
    ///
    /// Creates the attendance record if the student has none yet.
    pub async fn update_location(
        &self,
        actor: &Principal,
        session_id: DbId,
        latitude: f64,
        longitude: f64,
        address: Option<String>,
        accuracy: Option<f64>,
    ) -> AppResult<Attendance> {
        validate_coordinates(latitude, longitude)?;
        ensure_student(actor, "report a location")?;

        let session = self.load_session(session_id).await?;
        if !session.is_enrolled(actor.user_id) {
            return Err(CoreError::NotEnrolled.into());
        }

        let record = self.ensure_record(session_id, actor.user_id).await?;
        let (saved, alert_id) = self
            .modify_record(record.id, |r, now| {
                r.update_location(latitude, longitude, address.clone(), accuracy, now)
            })
            .await?;

        if let Some(alert) = alert_id.and_then(|id| saved.alert(id)) {
            self.publish_alert(&saved, alert);
        }
        Ok(saved)
    }

    // ---------------------------------------------------------------------------
    // Faculty operations
    // ---------------------------------------------------------------------------

    pub async fn add_alert(
        &self,
        actor: &Principal,
        session_id: DbId,
        student_id: DbId,
        input: ManualAlert,
    ) -> AppResult<Alert> {
        let session = self.load_session(session_id).await?;
        session.ensure_can_manage(actor)?;
        let record = self.require_record(session_id, student_id).await?;

        let severity = input
            .severity
            .unwrap_or_else(|| input.alert_type.default_severity());
        let (saved, alert_id) = self
            .modify_record(record.id, |r, now| {
                Ok(r.add_alert(
                    input.alert_type,
                    input.details.clone(),
                    severity,
                    input.extra.clone(),
                    now,
                ))
            })
            .await?;

        let alert = saved
            .alert(alert_id)
            .cloned()
            .ok_or_else(|| AppError::InternalError(format!("Alert {alert_id} missing after save")))?;
        self.publish_alert(&saved, &alert);

        tracing::info!(
            session_id,
            student_id,
            user_id = actor.user_id,
            alert_id = %alert.id,
            "Manual alert raised"
        );
        Ok(alert)
    }

    pub async fn resolve_alert(
        &self,
        actor: &Principal,
        session_id: DbId,
        student_id: DbId,
        alert_id: Uuid,
        resolution: Option<String>,
    ) -> AppResult<Alert> {
        let session = self.load_session(session_id).await?;
        session.ensure_can_manage(actor)?;
        let record = self.require_record(session_id, student_id).await?;

        let (saved, alert) = self
            .modify_record(record.id, |r, now| {
                r.resolve_alert(alert_id, actor.user_id, resolution.clone(), now)
                    .cloned()
            })
            .await?;

        self.broadcaster.publish(
            &monitor_room(session_id),
            events::ALERT_RESOLVED,
            json!({
                "session_id": session_id,
                "student_id": student_id,
                "alert": alert,
                "calculated": saved.calculated,
            }),
        );
        tracing::info!(session_id, student_id, alert_id = %alert_id, "Alert resolved");
        Ok(alert)
    }

    /// Adjust an engagement counter on behalf of the owning faculty.
    pub async fn adjust_engagement(
        &self,
        actor: &Principal,
        session_id: DbId,
        student_id: DbId,
        kind: EngagementKind,
        delta: i32,
    ) -> AppResult<Attendance> {
        let session = self.load_session(session_id).await?;
        session.ensure_can_manage(actor)?;
        let record = self.require_record(session_id, student_id).await?;
        let (saved, ()) = self
            .modify_record(record.id, |r, now| {
                r.update_engagement(kind, delta, now);
                Ok(())
            })
            .await?;
        Ok(saved)
    }

    // ---------------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------------

    pub async fn dashboard(
        &self,
        actor: &Principal,
        session_id: DbId,
    ) -> AppResult<Vec<DashboardEntry>> {
        let session = self.load_session(session_id).await?;
        session.ensure_can_manage(actor)?;

        let records = self.store.attendance.list_by_session(session_id).await?;
        let ids: Vec<DbId> = records.iter().map(|r| r.student_id).collect();
        let identities = self
            .store
            .users
            .find_many(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.identity()))
            .collect::<HashMap<_, _>>();

        Ok(dashboard_rows(records, &identities, Utc::now()))
    }

    pub async fn my_attendance(&self, actor: &Principal, session_id: DbId) -> AppResult<Attendance> {
        ensure_student(actor, "read their own attendance")?;
        let mut record = self.require_record(session_id, actor.user_id).await?;
        record.recalculate(Utc::now());
        Ok(record)
    }

    pub async fn summary(&self, actor: &Principal, session_id: DbId) -> AppResult<AttendanceSummary> {
        let session = self.load_session(session_id).await?;
        session.ensure_can_manage(actor)?;
        Ok(self.store.attendance.summary(session_id).await?)
    }

    // ---------------------------------------------------------------------------
    // Bookkeeping driven by the other engines
    // ---------------------------------------------------------------------------

    pub(crate) async fn mark_joined(&self, session_id: DbId, student_id: DbId) -> AppResult<Attendance> {
        let record = self.ensure_record(session_id, student_id).await?;
        let (saved, ()) = self
            .modify_record(record.id, |r, now| {
                r.mark_joined(now);
                Ok(())
            })
            .await?;
        Ok(saved)
    }

    /// Mark the student's record left. Students without a record are skipped.
    pub(crate) async fn mark_left(
        &self,
        session_id: DbId,
        student_id: DbId,
    ) -> AppResult<Option<Attendance>> {
        let Some(record) = self.store.attendance.find(session_id, student_id).await? else {
            return Ok(None);
        };
        let (saved, ()) = self
            .modify_record(record.id, |r, now| {
                r.mark_left(now);
                Ok(())
            })
            .await?;
        Ok(Some(saved))
    }

    /// Flag a dropped socket. No alert is raised.
    pub(crate) async fn mark_disconnected(&self, session_id: DbId, student_id: DbId) -> AppResult<()> {
        let Some(record) = self.store.attendance.find(session_id, student_id).await? else {
            return Ok(());
        };
        if record.status == AttendanceStatus::Left {
            return Ok(());
        }
        let (saved, ()) = self
            .modify_record(record.id, |r, now| {
                r.mark_disconnected(now);
                Ok(())
            })
            .await?;

        self.broadcaster.publish(
            &monitor_room(session_id),
            events::STUDENT_DISCONNECTED,
            json!({
                "session_id": session_id,
                "student_id": student_id,
                "status": saved.status,
            }),
        );
        Ok(())
    }

    /// Bump an engagement counter. Students without a record are skipped.
    pub(crate) async fn update_engagement(
        &self,
        session_id: DbId,
        student_id: DbId,
        kind: EngagementKind,
        delta: i32,
    ) -> AppResult<Option<Attendance>> {
        let Some(record) = self.store.attendance.find(session_id, student_id).await? else {
            tracing::debug!(session_id, student_id, ?kind, "No attendance record, engagement skipped");
            return Ok(None);
        };
        let (saved, ()) = self
            .modify_record(record.id, |r, now| {
                r.update_engagement(kind, delta, now);
                Ok(())
            })
            .await?;
        Ok(Some(saved))
    }

    /// Participation score of every student with a record in the session.
    pub(crate) async fn participation_scores(&self, session_id: DbId) -> AppResult<HashMap<DbId, i32>> {
        Ok(self
            .store
            .attendance
            .list_by_session(session_id)
            .await?
            .into_iter()
            .map(|r| (r.student_id, r.engagement.participation_score))
            .collect())
    }

    // ---------------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------------

    async fn load_session(&self, session_id: DbId) -> AppResult<ClassSession> {
        load(&*self.store.sessions, "Session", session_id).await
    }

    async fn require_record(&self, session_id: DbId, student_id: DbId) -> AppResult<Attendance> {
        self.store
            .attendance
            .find(session_id, student_id)
            .await?
            .ok_or_else(|| {
                CoreError::not_found("Attendance", format!("{session_id}/{student_id}")).into()
            })
    }

    /// Fetch the record, creating it on first contact.
    ///
    /// Two concurrent creators collide on the `(session_id, student_id)`
    /// unique constraint; the loser re-reads the winner's record.
    async fn ensure_record(&self, session_id: DbId, student_id: DbId) -> AppResult<Attendance> {
        if let Some(record) = self.store.attendance.find(session_id, student_id).await? {
            return Ok(record);
        }

        let now = Utc::now();
        let mut record = Attendance::new(session_id, student_id, now);
        record.recalculate(now);
        match self.store.attendance.insert(&record).await {
            Ok(saved) => {
                tracing::debug!(session_id, student_id, attendance_id = saved.id, "Attendance created");
                Ok(saved)
            }
            Err(StoreError::Duplicate(_)) => self
                .store
                .attendance
                .find(session_id, student_id)
                .await?
                .ok_or_else(|| {
                    AppError::InternalError("Attendance missing after duplicate insert".into())
                }),
            Err(err) => Err(err.into()),
        }
    }

    /// [`modify`] for attendance records, re-deriving scores before each save.
    async fn modify_record<F, R>(&self, id: DbId, mut apply: F) -> AppResult<(Attendance, R)>
    where
        F: FnMut(&mut Attendance, Timestamp) -> Result<R, CoreError> + Send,
        R: Send,
    {
        modify(&*self.store.attendance, "Attendance", id, |record: &mut Attendance| {
            let now = Utc::now();
            let outcome = apply(record, now)?;
            record.recalculate(now);
            Ok(outcome)
        })
        .await
    }

    fn publish_alert(&self, record: &Attendance, alert: &Alert) {
        self.broadcaster.publish(
            &monitor_room(record.session_id),
            events::MONITORING_ALERT,
            json!({
                "session_id": record.session_id,
                "student_id": record.student_id,
                "attendance_id": record.id,
                "alert": alert,
                "status": record.status,
                "calculated": record.calculated,
            }),
        );
    }
}

fn ensure_student(actor: &Principal, action: &str) -> Result<(), CoreError> {
    if actor.is_student() {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!("Only students can {action}")))
    }
}
