//! Class session lifecycle, roster and analytics.
//!
//! A session moves `scheduled → live → {paused ⇄ live} → ended`, or
//! `scheduled → cancelled`. Every transition here is a pure mutation of a
//! [`ClassSession`] value; persistence and broadcasting happen in the
//! calling engine.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::{Principal, Role};
use crate::types::{DbId, Timestamp};

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

pub const MIN_DURATION_MINUTES: i32 = 5;
pub const MAX_DURATION_MINUTES: i32 = 480;
pub const MAX_TITLE_LENGTH: usize = 200;
pub const DEFAULT_LATE_JOIN_CUTOFF_MINUTES: i64 = 15;
pub const DEFAULT_MAX_CONCURRENT_STUDENTS: i32 = 100;

/* --------------------------------------------------------------------------
Status and actions
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Live,
    Paused,
    Ended,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Live => "live",
            SessionStatus::Paused => "paused",
            SessionStatus::Ended => "ended",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Cancelled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(SessionStatus::Scheduled),
            "live" => Ok(SessionStatus::Live),
            "paused" => Ok(SessionStatus::Paused),
            "ended" => Ok(SessionStatus::Ended),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(CoreError::Validation(format!(
                "Invalid session status '{other}'"
            ))),
        }
    }
}

/// A lifecycle transition requested by the owning faculty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Start,
    Pause,
    Resume,
    End,
    Cancel,
}

impl SessionAction {
    /// Name of the event published to the session room after the transition.
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionAction::Start => "session_started",
            SessionAction::Pause => "session_paused",
            SessionAction::Resume => "session_resumed",
            SessionAction::End => "session_ended",
            SessionAction::Cancel => "session_cancelled",
        }
    }
}

/* --------------------------------------------------------------------------
Entity
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub allow_late_join: bool,
    pub late_join_cutoff_minutes: i64,
    pub require_location_verification: bool,
    pub enable_chat: bool,
    pub enable_polls: bool,
    pub enable_screen_share: bool,
    pub enable_recording: bool,
    pub max_concurrent_students: i32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            allow_late_join: true,
            late_join_cutoff_minutes: DEFAULT_LATE_JOIN_CUTOFF_MINUTES,
            require_location_verification: false,
            enable_chat: true,
            enable_polls: true,
            enable_screen_share: false,
            enable_recording: false,
            max_concurrent_students: DEFAULT_MAX_CONCURRENT_STUDENTS,
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.late_join_cutoff_minutes < 0 {
            return Err(CoreError::Validation(
                "late_join_cutoff_minutes must not be negative".into(),
            ));
        }
        if self.max_concurrent_students < 1 {
            return Err(CoreError::Validation(
                "max_concurrent_students must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub student_id: DbId,
    pub enrolled_at: Timestamp,
    pub joined_at: Option<Timestamp>,
    pub left_at: Option<Timestamp>,
    pub is_present: bool,
    pub last_activity: Option<Timestamp>,
    pub participation_score: i32,
}

impl RosterEntry {
    pub fn new(student_id: DbId, now: Timestamp) -> Self {
        Self {
            student_id,
            enrolled_at: now,
            joined_at: None,
            left_at: None,
            is_present: false,
            last_activity: None,
            participation_score: 0,
        }
    }
}

/// Derived roster statistics. Recomputed before every save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionAnalytics {
    pub total_enrolled: i32,
    pub total_joined: i32,
    /// Highest number of simultaneously present students observed.
    pub max_concurrent_students: i32,
    pub attendance_rate: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSession {
    pub id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub faculty_id: DbId,
    pub college_id: DbId,
    pub scheduled_start: Timestamp,
    pub scheduled_end: Option<Timestamp>,
    pub duration_minutes: i32,
    pub status: SessionStatus,
    pub is_active: bool,
    pub actual_start_time: Option<Timestamp>,
    pub actual_end_time: Option<Timestamp>,
    pub roster: Vec<RosterEntry>,
    pub settings: SessionSettings,
    pub analytics: SessionAnalytics,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Fields supplied when scheduling a new session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub scheduled_start: Timestamp,
    pub scheduled_end: Option<Timestamp>,
    pub duration_minutes: i32,
    pub settings: SessionSettings,
}

/// Partial update of a session's descriptive fields and settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub scheduled_start: Option<Timestamp>,
    pub scheduled_end: Option<Timestamp>,
    pub duration_minutes: Option<i32>,
    pub settings: Option<SessionSettings>,
}

/// A user being considered for enrollment.
#[derive(Debug, Clone, Copy)]
pub struct EnrollCandidate {
    pub user_id: DbId,
    pub role: Role,
    pub college_id: DbId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrollOutcome {
    pub enrolled: usize,
    pub already_enrolled: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Admin or owning faculty watching the session; the roster is untouched.
    Observing,
    /// A student was marked present.
    Joined { first_join: bool },
}

/* --------------------------------------------------------------------------
Validation
-------------------------------------------------------------------------- */

pub fn validate_title(title: &str) -> Result<(), CoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Session title must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Session title exceeds maximum length of {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_subject(subject: &str) -> Result<(), CoreError> {
    if subject.trim().is_empty() {
        return Err(CoreError::Validation("Subject must not be empty".into()));
    }
    Ok(())
}

pub fn validate_schedule(
    scheduled_start: Timestamp,
    scheduled_end: Option<Timestamp>,
    duration_minutes: i32,
) -> Result<(), CoreError> {
    if let Some(end) = scheduled_end {
        if end <= scheduled_start {
            return Err(CoreError::Validation(
                "scheduled_end must be after scheduled_start".into(),
            ));
        }
    }
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        return Err(CoreError::Validation(format!(
            "duration_minutes must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES}, got {duration_minutes}"
        )));
    }
    Ok(())
}

/* --------------------------------------------------------------------------
Behaviour
-------------------------------------------------------------------------- */

impl ClassSession {
    /// Build an unsaved session owned by `faculty_id`. The store assigns the id.
    pub fn new(
        input: NewSession,
        faculty_id: DbId,
        college_id: DbId,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        validate_title(&input.title)?;
        validate_subject(&input.subject)?;
        validate_schedule(
            input.scheduled_start,
            input.scheduled_end,
            input.duration_minutes,
        )?;
        input.settings.validate()?;

        Ok(Self {
            id: 0,
            title: input.title.trim().to_string(),
            description: input.description.map(|d| d.trim().to_string()),
            subject: input.subject.trim().to_string(),
            faculty_id,
            college_id,
            scheduled_start: input.scheduled_start,
            scheduled_end: input.scheduled_end,
            duration_minutes: input.duration_minutes,
            status: SessionStatus::Scheduled,
            is_active: false,
            actual_start_time: None,
            actual_end_time: None,
            roster: Vec::new(),
            settings: input.settings,
            analytics: SessionAnalytics::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_owner(&self, actor: &Principal) -> bool {
        actor.user_id == self.faculty_id
    }

    /// Owning faculty, or an admin of the same college.
    pub fn can_manage(&self, actor: &Principal) -> bool {
        self.is_owner(actor) || (actor.is_admin() && actor.college_id == self.college_id)
    }

    pub fn ensure_owner(&self, actor: &Principal) -> Result<(), CoreError> {
        if self.is_owner(actor) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(
                "Only the session's faculty can change its lifecycle".into(),
            ))
        }
    }

    pub fn ensure_can_manage(&self, actor: &Principal) -> Result<(), CoreError> {
        if self.can_manage(actor) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(
                "Only the session's faculty or an admin can do this".into(),
            ))
        }
    }

    /// Managers always participate; students must be on the roster.
    pub fn ensure_participant(&self, actor: &Principal) -> Result<(), CoreError> {
        if self.can_manage(actor) {
            return Ok(());
        }
        match actor.role {
            Role::Student if self.is_enrolled(actor.user_id) => Ok(()),
            Role::Student => Err(CoreError::NotEnrolled),
            _ => Err(CoreError::Forbidden(
                "You are not a participant of this session".into(),
            )),
        }
    }

    pub fn roster_entry(&self, student_id: DbId) -> Option<&RosterEntry> {
        self.roster.iter().find(|e| e.student_id == student_id)
    }

    fn roster_entry_mut(&mut self, student_id: DbId) -> Option<&mut RosterEntry> {
        self.roster.iter_mut().find(|e| e.student_id == student_id)
    }

    pub fn is_enrolled(&self, student_id: DbId) -> bool {
        self.roster_entry(student_id).is_some()
    }

    pub fn present_count(&self) -> usize {
        self.roster.iter().filter(|e| e.is_present).count()
    }

    pub fn present_students(&self) -> Vec<DbId> {
        self.roster
            .iter()
            .filter(|e| e.is_present)
            .map(|e| e.student_id)
            .collect()
    }

    // -- Lifecycle ----------------------------------------------------------

    pub fn start(&mut self, actor: &Principal, now: Timestamp) -> Result<(), CoreError> {
        self.ensure_owner(actor)?;
        match self.status {
            SessionStatus::Scheduled => {}
            SessionStatus::Live => {
                return Err(CoreError::InvalidState("Session is already live".into()))
            }
            SessionStatus::Paused => {
                return Err(CoreError::InvalidState(
                    "Session is paused; resume it instead".into(),
                ))
            }
            SessionStatus::Ended | SessionStatus::Cancelled => {
                return Err(CoreError::InvalidState(format!(
                    "Cannot start a session that is {}",
                    self.status
                )))
            }
        }
        self.status = SessionStatus::Live;
        self.is_active = true;
        if self.actual_start_time.is_none() {
            self.actual_start_time = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn pause(&mut self, actor: &Principal, now: Timestamp) -> Result<(), CoreError> {
        self.ensure_owner(actor)?;
        self.require_status(SessionStatus::Live, "pause")?;
        self.status = SessionStatus::Paused;
        self.updated_at = now;
        Ok(())
    }

    pub fn resume(&mut self, actor: &Principal, now: Timestamp) -> Result<(), CoreError> {
        self.ensure_owner(actor)?;
        self.require_status(SessionStatus::Paused, "resume")?;
        self.status = SessionStatus::Live;
        self.updated_at = now;
        Ok(())
    }

    /// End a live session, checking out everyone still present.
    ///
    /// Returns the ids of the students that were checked out.
    pub fn end(&mut self, actor: &Principal, now: Timestamp) -> Result<Vec<DbId>, CoreError> {
        self.ensure_owner(actor)?;
        self.require_status(SessionStatus::Live, "end")?;

        let mut checked_out = Vec::new();
        for entry in self.roster.iter_mut() {
            if entry.is_present && entry.left_at.is_none() {
                entry.left_at = Some(now);
                entry.is_present = false;
                checked_out.push(entry.student_id);
            }
        }

        self.status = SessionStatus::Ended;
        self.is_active = false;
        self.actual_end_time = Some(now);
        self.updated_at = now;
        Ok(checked_out)
    }

    pub fn cancel(&mut self, actor: &Principal, now: Timestamp) -> Result<(), CoreError> {
        self.ensure_owner(actor)?;
        if self.status != SessionStatus::Scheduled {
            return Err(CoreError::InvalidState(format!(
                "Only scheduled sessions can be cancelled (session is {})",
                self.status
            )));
        }
        self.status = SessionStatus::Cancelled;
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }

    /// Dispatch a lifecycle action. Returns checked-out students for `End`.
    pub fn apply_action(
        &mut self,
        action: SessionAction,
        actor: &Principal,
        now: Timestamp,
    ) -> Result<Vec<DbId>, CoreError> {
        match action {
            SessionAction::Start => self.start(actor, now).map(|_| Vec::new()),
            SessionAction::Pause => self.pause(actor, now).map(|_| Vec::new()),
            SessionAction::Resume => self.resume(actor, now).map(|_| Vec::new()),
            SessionAction::End => self.end(actor, now),
            SessionAction::Cancel => self.cancel(actor, now).map(|_| Vec::new()),
        }
    }

    fn require_status(&self, expected: SessionStatus, verb: &str) -> Result<(), CoreError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(CoreError::InvalidState(format!(
                "Cannot {verb} a session that is {} (must be {expected})",
                self.status
            )))
        }
    }

    // -- Details ------------------------------------------------------------

    pub fn apply_update(
        &mut self,
        actor: &Principal,
        update: SessionUpdate,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        self.ensure_owner(actor)?;
        if self.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "Cannot update a session that is {}",
                self.status
            )));
        }

        let start = update.scheduled_start.unwrap_or(self.scheduled_start);
        let end = update.scheduled_end.or(self.scheduled_end);
        let duration = update.duration_minutes.unwrap_or(self.duration_minutes);
        validate_schedule(start, end, duration)?;
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        if let Some(subject) = &update.subject {
            validate_subject(subject)?;
        }
        if let Some(settings) = &update.settings {
            settings.validate()?;
        }

        if let Some(title) = update.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = Some(description.trim().to_string());
        }
        if let Some(subject) = update.subject {
            self.subject = subject.trim().to_string();
        }
        if let Some(settings) = update.settings {
            self.settings = settings;
        }
        self.scheduled_start = start;
        self.scheduled_end = end;
        self.duration_minutes = duration;
        self.updated_at = now;
        Ok(())
    }

    // -- Roster -------------------------------------------------------------

    /// Add students to the roster. Already-enrolled students are skipped.
    ///
    /// Every candidate must be a student of the session's college.
    pub fn enroll(
        &mut self,
        actor: &Principal,
        candidates: &[EnrollCandidate],
        now: Timestamp,
    ) -> Result<EnrollOutcome, CoreError> {
        self.ensure_can_manage(actor)?;
        if self.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "Cannot enroll students into a session that is {}",
                self.status
            )));
        }
        for candidate in candidates {
            if candidate.role != Role::Student {
                return Err(CoreError::Forbidden(format!(
                    "User {} is not a student",
                    candidate.user_id
                )));
            }
            if candidate.college_id != self.college_id {
                return Err(CoreError::Forbidden(format!(
                    "Student {} belongs to a different college",
                    candidate.user_id
                )));
            }
        }

        let mut outcome = EnrollOutcome::default();
        let mut seen = HashSet::new();
        for candidate in candidates {
            if !seen.insert(candidate.user_id) || self.is_enrolled(candidate.user_id) {
                outcome.already_enrolled += 1;
                continue;
            }
            self.roster.push(RosterEntry::new(candidate.user_id, now));
            outcome.enrolled += 1;
        }
        self.updated_at = now;
        Ok(outcome)
    }

    /// Mark a student present in a live session.
    ///
    /// The late-join cutoff only applies to a student's first join; a student
    /// who already attended may reconnect.
    pub fn join(
        &mut self,
        actor: &Principal,
        location_verified: bool,
        now: Timestamp,
    ) -> Result<JoinOutcome, CoreError> {
        if self.can_manage(actor) {
            return Ok(JoinOutcome::Observing);
        }
        if actor.role != Role::Student {
            return Err(CoreError::Forbidden(
                "Only enrolled students can join this session".into(),
            ));
        }

        let entry = self
            .roster_entry(actor.user_id)
            .ok_or(CoreError::NotEnrolled)?;
        let first_join = entry.joined_at.is_none();
        let already_present = entry.is_present;

        if self.status != SessionStatus::Live {
            return Err(CoreError::InvalidState(format!(
                "Session is {}, not live",
                self.status
            )));
        }

        if first_join && !self.settings.allow_late_join {
            if let Some(started) = self.actual_start_time {
                let cutoff = self.settings.late_join_cutoff_minutes;
                if now > started + Duration::minutes(cutoff) {
                    return Err(CoreError::LateJoinRejected {
                        minutes_late: (now - started).num_minutes(),
                        cutoff_minutes: cutoff,
                    });
                }
            }
        }

        if !already_present && self.present_count() >= self.settings.max_concurrent_students as usize
        {
            return Err(CoreError::SessionFull {
                max: self.settings.max_concurrent_students,
            });
        }

        if self.settings.require_location_verification && !location_verified {
            return Err(CoreError::LocationRequired);
        }

        if let Some(entry) = self.roster_entry_mut(actor.user_id) {
            if entry.joined_at.is_none() {
                entry.joined_at = Some(now);
            }
            entry.left_at = None;
            entry.is_present = true;
            entry.last_activity = Some(now);
        }

        let present = self.present_count() as i32;
        self.analytics.max_concurrent_students = self.analytics.max_concurrent_students.max(present);
        self.updated_at = now;
        Ok(JoinOutcome::Joined { first_join })
    }

    /// Mark a student as having left. Observers leave without a roster change.
    ///
    /// Returns `true` when a roster entry was updated.
    pub fn leave(&mut self, actor: &Principal, now: Timestamp) -> Result<bool, CoreError> {
        if self.can_manage(actor) {
            return Ok(false);
        }
        let entry = self
            .roster_entry_mut(actor.user_id)
            .ok_or(CoreError::NotEnrolled)?;
        entry.left_at = Some(now);
        entry.is_present = false;
        entry.last_activity = Some(now);
        self.updated_at = now;
        Ok(true)
    }

    /// Copy participation scores (keyed by student id) onto the roster.
    pub fn sync_participation(&mut self, scores: &HashMap<DbId, i32>) {
        for entry in self.roster.iter_mut() {
            if let Some(score) = scores.get(&entry.student_id) {
                entry.participation_score = (*score).clamp(0, 100);
            }
        }
    }

    /// Recompute the derived analytics block from the roster.
    pub fn recompute_analytics(&mut self) {
        let enrolled = self.roster.len();
        let present = self.present_count();
        let joined = self.roster.iter().filter(|e| e.joined_at.is_some()).count();

        self.analytics.total_enrolled = enrolled as i32;
        self.analytics.total_joined = joined as i32;
        self.analytics.max_concurrent_students =
            self.analytics.max_concurrent_students.max(present as i32);
        self.analytics.attendance_rate = if enrolled == 0 {
            0
        } else {
            ((present as f64 * 100.0) / enrolled as f64).round() as i32
        };
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
