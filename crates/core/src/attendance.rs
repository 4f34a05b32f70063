//! Per-student attendance records, behavioural monitoring and derived scores.
//!
//! One [`Attendance`] exists per (session, student) pair. Activity events,
//! location updates and engagement counters mutate it; [`Attendance::recalculate`]
//! derives duration, behaviour score, engagement level and risk level from
//! the primary fields and must run before every save and every response.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::CoreError;
use crate::geo::{haversine_km, validate_coordinates};
use crate::types::{DbId, Timestamp};

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

/// Moves shorter than this (km) do not raise a location alert.
pub const LOCATION_ALERT_THRESHOLD_KM: f64 = 0.1;

/// Moves longer than this (km) raise a high-severity location alert.
pub const LOCATION_HIGH_SEVERITY_KM: f64 = 1.0;

pub const BASE_PARTICIPATION_SCORE: i32 = 50;
pub const MAX_SCORE: i32 = 100;

/* --------------------------------------------------------------------------
Enumerations
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    TabSwitch,
    AppSwitch,
    WindowFocusLoss,
    ScreenshotAttempt,
    RecordingAttempt,
    NetworkDisconnect,
    SuspiciousActivity,
    LocationChange,
    /// Raised by hand by the session's faculty.
    Manual,
}

impl AlertType {
    /// The single severity mapping applied to every monitored alert type.
    pub fn default_severity(&self) -> Severity {
        match self {
            AlertType::TabSwitch => Severity::Medium,
            AlertType::AppSwitch => Severity::High,
            AlertType::WindowFocusLoss => Severity::Low,
            AlertType::ScreenshotAttempt => Severity::High,
            AlertType::RecordingAttempt => Severity::Critical,
            AlertType::NetworkDisconnect => Severity::Medium,
            AlertType::SuspiciousActivity => Severity::High,
            AlertType::LocationChange => Severity::Medium,
            AlertType::Manual => Severity::Medium,
        }
    }

    fn default_details(&self) -> &'static str {
        match self {
            AlertType::TabSwitch => "Student switched browser tabs",
            AlertType::AppSwitch => "Student switched to another application",
            AlertType::WindowFocusLoss => "Session window lost focus",
            AlertType::ScreenshotAttempt => "Screenshot attempt detected",
            AlertType::RecordingAttempt => "Screen recording attempt detected",
            AlertType::NetworkDisconnect => "Network connection lost",
            AlertType::SuspiciousActivity => "Suspicious activity detected",
            AlertType::LocationChange => "Student location changed",
            AlertType::Manual => "Flagged by faculty",
        }
    }
}

/// Client-reported activity event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Heartbeat,
    TabSwitch,
    AppSwitch,
    WindowFocusLoss,
    ScreenshotAttempt,
    RecordingAttempt,
    InactivePeriod,
    NetworkChange,
    SuspiciousActivity,
}

impl ActivityType {
    /// Parse a wire name. Unknown names yield `None` and are ignored upstream.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "heartbeat" => Some(ActivityType::Heartbeat),
            "tab_switch" => Some(ActivityType::TabSwitch),
            "app_switch" => Some(ActivityType::AppSwitch),
            "window_focus_loss" => Some(ActivityType::WindowFocusLoss),
            "screenshot_attempt" => Some(ActivityType::ScreenshotAttempt),
            "recording_attempt" => Some(ActivityType::RecordingAttempt),
            "inactive_period" => Some(ActivityType::InactivePeriod),
            "network_change" => Some(ActivityType::NetworkChange),
            "suspicious_activity" => Some(ActivityType::SuspiciousActivity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    Message,
    Poll,
    Question,
    Reaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Joined,
    Active,
    Inactive,
    Suspicious,
    Disconnected,
    Left,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Joined => "joined",
            AttendanceStatus::Active => "active",
            AttendanceStatus::Inactive => "inactive",
            AttendanceStatus::Suspicious => "suspicious",
            AttendanceStatus::Disconnected => "disconnected",
            AttendanceStatus::Left => "left",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* --------------------------------------------------------------------------
Entity
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub accuracy: Option<f64>,
    pub verified: bool,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityMonitoring {
    pub tab_switches: i32,
    pub app_switches: i32,
    pub window_focus_loss: i32,
    /// Accumulated inactivity in seconds.
    pub inactive_time: i64,
    pub screenshot_attempts: i32,
    pub recording_attempts: i32,
    pub disconnections: i32,
    pub reconnections: i32,
    pub last_activity: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Engagement {
    pub messages_count: i32,
    pub polls_participated: i32,
    pub questions_asked: i32,
    pub reactions_given: i32,
    pub participation_score: i32,
}

impl Default for Engagement {
    fn default() -> Self {
        Self {
            messages_count: 0,
            polls_participated: 0,
            questions_asked: 0,
            reactions_given: 0,
            participation_score: BASE_PARTICIPATION_SCORE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub timestamp: Timestamp,
    pub is_resolved: bool,
    pub resolved_at: Option<Timestamp>,
    pub resolved_by: Option<DbId>,
    pub details: String,
    pub extra: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedScores {
    pub behavior_score: i32,
    pub engagement_level: EngagementLevel,
    pub risk_level: RiskLevel,
}

impl Default for CalculatedScores {
    fn default() -> Self {
        Self {
            behavior_score: MAX_SCORE,
            engagement_level: EngagementLevel::Medium,
            risk_level: RiskLevel::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendance {
    pub id: DbId,
    pub session_id: DbId,
    pub student_id: DbId,
    pub location: Option<Location>,
    pub join_time: Option<Timestamp>,
    pub leave_time: Option<Timestamp>,
    /// Minutes present, derived.
    pub total_duration: i64,
    pub activity_monitoring: ActivityMonitoring,
    pub engagement: Engagement,
    pub alerts: Vec<Alert>,
    pub calculated: CalculatedScores,
    pub status: AttendanceStatus,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/* --------------------------------------------------------------------------
Derived scores
-------------------------------------------------------------------------- */

/// `min(100, 50 + min(msg*2,20) + min(polls*5,15) + min(q*3,10) + min(reactions,5))`.
pub fn participation_score(e: &Engagement) -> i32 {
    let score = BASE_PARTICIPATION_SCORE
        + (e.messages_count.max(0) * 2).min(20)
        + (e.polls_participated.max(0) * 5).min(15)
        + (e.questions_asked.max(0) * 3).min(10)
        + e.reactions_given.max(0).min(5);
    score.min(MAX_SCORE)
}

pub fn behavior_score(m: &ActivityMonitoring) -> i32 {
    let penalty = 2 * i64::from(m.tab_switches)
        + 5 * i64::from(m.app_switches)
        + i64::from(m.window_focus_loss)
        + 20 * i64::from(m.screenshot_attempts)
        + 30 * i64::from(m.recording_attempts);
    (i64::from(MAX_SCORE) - penalty).clamp(0, i64::from(MAX_SCORE)) as i32
}

pub fn engagement_level(participation_score: i32) -> EngagementLevel {
    match participation_score {
        s if s >= 80 => EngagementLevel::VeryHigh,
        s if s >= 60 => EngagementLevel::High,
        s if s >= 40 => EngagementLevel::Medium,
        s if s >= 20 => EngagementLevel::Low,
        _ => EngagementLevel::VeryLow,
    }
}

/// Risk bucket from the full alert history and the behaviour score.
pub fn risk_level(alerts: &[Alert], behavior_score: i32) -> RiskLevel {
    let has_critical = alerts.iter().any(|a| a.severity == Severity::Critical);
    let high_count = alerts
        .iter()
        .filter(|a| a.severity == Severity::High)
        .count();

    if has_critical || behavior_score < 30 {
        RiskLevel::Critical
    } else if high_count > 2 || behavior_score < 50 {
        RiskLevel::High
    } else if high_count > 0 || behavior_score < 70 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Whole minutes between join and leave (or `now` while still joined).
pub fn total_duration_minutes(
    join: Option<Timestamp>,
    leave: Option<Timestamp>,
    now: Timestamp,
) -> i64 {
    match (join, leave) {
        (Some(join), Some(leave)) => (leave - join).num_minutes().max(0),
        (Some(join), None) => (now - join).num_minutes().max(0),
        _ => 0,
    }
}

/* --------------------------------------------------------------------------
Behaviour
-------------------------------------------------------------------------- */

impl Attendance {
    pub fn new(session_id: DbId, student_id: DbId, now: Timestamp) -> Self {
        let mut record = Self {
            id: 0,
            session_id,
            student_id,
            location: None,
            join_time: None,
            leave_time: None,
            total_duration: 0,
            activity_monitoring: ActivityMonitoring {
                last_activity: Some(now),
                ..Default::default()
            },
            engagement: Engagement::default(),
            alerts: Vec::new(),
            calculated: CalculatedScores::default(),
            status: AttendanceStatus::Joined,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        record.recalculate(now);
        record
    }

    fn touch(&mut self, now: Timestamp) {
        self.activity_monitoring.last_activity = Some(now);
        self.updated_at = now;
    }

    pub fn has_verified_location(&self) -> bool {
        self.location.as_ref().is_some_and(|l| l.verified)
    }

    pub fn alert(&self, alert_id: Uuid) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == alert_id)
    }

    pub fn unresolved_alert_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.is_resolved).count()
    }

    /// Record a (re)join. The first join time is kept across reconnects.
    pub fn mark_joined(&mut self, now: Timestamp) {
        if self.join_time.is_none() {
            self.join_time = Some(now);
        }
        self.leave_time = None;
        self.status = AttendanceStatus::Joined;
        self.touch(now);
    }

    pub fn mark_left(&mut self, now: Timestamp) {
        self.leave_time = Some(now);
        self.status = AttendanceStatus::Left;
        self.touch(now);
    }

    /// Transport-level hang-up; no alert is raised.
    pub fn mark_disconnected(&mut self, now: Timestamp) {
        if self.status != AttendanceStatus::Left {
            self.status = AttendanceStatus::Disconnected;
        }
        self.updated_at = now;
    }

    /// Append an alert and bump the matching monitoring counter.
    pub fn add_alert(
        &mut self,
        alert_type: AlertType,
        details: impl Into<String>,
        severity: Severity,
        extra: Option<Value>,
        now: Timestamp,
    ) -> Uuid {
        let m = &mut self.activity_monitoring;
        match alert_type {
            AlertType::TabSwitch => m.tab_switches += 1,
            AlertType::AppSwitch => m.app_switches += 1,
            AlertType::WindowFocusLoss => m.window_focus_loss += 1,
            AlertType::ScreenshotAttempt => m.screenshot_attempts += 1,
            AlertType::RecordingAttempt => m.recording_attempts += 1,
            AlertType::NetworkDisconnect
            | AlertType::SuspiciousActivity
            | AlertType::LocationChange
            | AlertType::Manual => {}
        }

        let id = Uuid::new_v4();
        self.alerts.push(Alert {
            id,
            alert_type,
            severity,
            timestamp: now,
            is_resolved: false,
            resolved_at: None,
            resolved_by: None,
            details: details.into(),
            extra: extra.unwrap_or_else(|| json!({})),
        });
        self.touch(now);
        id
    }

    /// Apply a client-reported activity. Returns the id of any alert raised.
    pub fn record_activity(
        &mut self,
        activity: ActivityType,
        details: &Value,
        now: Timestamp,
    ) -> Option<Uuid> {
        let alert_type = match activity {
            ActivityType::Heartbeat => {
                self.status = AttendanceStatus::Active;
                self.touch(now);
                return None;
            }
            ActivityType::InactivePeriod => {
                let seconds = details
                    .get("duration")
                    .and_then(Value::as_f64)
                    .filter(|d| d.is_finite() && *d >= 0.0)
                    .map(|d| d as i64)
                    .unwrap_or(0);
                self.activity_monitoring.inactive_time += seconds;
                self.status = AttendanceStatus::Inactive;
                self.touch(now);
                return None;
            }
            ActivityType::NetworkChange => {
                return match connection_state(details) {
                    Some(false) => {
                        self.activity_monitoring.disconnections += 1;
                        self.status = AttendanceStatus::Disconnected;
                        Some(self.raise(AlertType::NetworkDisconnect, details, now))
                    }
                    Some(true) => {
                        self.activity_monitoring.reconnections += 1;
                        self.status = AttendanceStatus::Active;
                        self.touch(now);
                        None
                    }
                    None => {
                        self.touch(now);
                        None
                    }
                };
            }
            ActivityType::SuspiciousActivity => {
                self.status = AttendanceStatus::Suspicious;
                AlertType::SuspiciousActivity
            }
            ActivityType::TabSwitch => AlertType::TabSwitch,
            ActivityType::AppSwitch => AlertType::AppSwitch,
            ActivityType::WindowFocusLoss => AlertType::WindowFocusLoss,
            ActivityType::ScreenshotAttempt => AlertType::ScreenshotAttempt,
            ActivityType::RecordingAttempt => AlertType::RecordingAttempt,
        };
        Some(self.raise(alert_type, details, now))
    }

    fn raise(&mut self, alert_type: AlertType, details: &Value, now: Timestamp) -> Uuid {
        let message = details
            .get("description")
            .or_else(|| details.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| alert_type.default_details().to_string());
        let extra = if details.is_object() {
            details.clone()
        } else {
            json!({})
        };
        self.add_alert(
            alert_type,
            message,
            alert_type.default_severity(),
            Some(extra),
            now,
        )
    }

    /// Overwrite the student's location, raising an alert on a large move.
    pub fn update_location(
        &mut self,
        latitude: f64,
        longitude: f64,
        address: Option<String>,
        accuracy: Option<f64>,
        now: Timestamp,
    ) -> Result<Option<Uuid>, CoreError> {
        validate_coordinates(latitude, longitude)?;

        let mut raised = None;
        if let Some(previous) = &self.location {
            let distance = haversine_km(previous.latitude, previous.longitude, latitude, longitude);
            if distance > LOCATION_ALERT_THRESHOLD_KM {
                let severity = if distance > LOCATION_HIGH_SEVERITY_KM {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let extra = json!({
                    "previous_location": {
                        "latitude": previous.latitude,
                        "longitude": previous.longitude,
                    },
                    "new_location": { "latitude": latitude, "longitude": longitude },
                    "distance_km": (distance * 1000.0).round() / 1000.0,
                });
                raised = Some(self.add_alert(
                    AlertType::LocationChange,
                    format!("Location changed by {distance:.2} km"),
                    severity,
                    Some(extra),
                    now,
                ));
            }
        }

        self.location = Some(Location {
            latitude,
            longitude,
            address,
            accuracy,
            verified: true,
            timestamp: now,
        });
        self.touch(now);
        Ok(raised)
    }

    /// Add `delta` to an engagement counter (floored at zero) and rescore.
    pub fn update_engagement(&mut self, kind: EngagementKind, delta: i32, now: Timestamp) {
        let e = &mut self.engagement;
        let counter = match kind {
            EngagementKind::Message => &mut e.messages_count,
            EngagementKind::Poll => &mut e.polls_participated,
            EngagementKind::Question => &mut e.questions_asked,
            EngagementKind::Reaction => &mut e.reactions_given,
        };
        *counter = counter.saturating_add(delta).max(0);
        e.participation_score = participation_score(e);
        self.touch(now);
    }

    pub fn resolve_alert(
        &mut self,
        alert_id: Uuid,
        resolved_by: DbId,
        resolution: Option<String>,
        now: Timestamp,
    ) -> Result<&Alert, CoreError> {
        let index = self
            .alerts
            .iter()
            .position(|a| a.id == alert_id)
            .ok_or_else(|| CoreError::not_found("Alert", alert_id))?;

        let alert = &mut self.alerts[index];
        if alert.is_resolved {
            return Err(CoreError::InvalidState("Alert is already resolved".into()));
        }
        alert.is_resolved = true;
        alert.resolved_at = Some(now);
        alert.resolved_by = Some(resolved_by);
        if let Some(text) = resolution {
            match alert.extra.as_object_mut() {
                Some(map) => {
                    map.insert("resolution".into(), Value::String(text));
                }
                None => {
                    let previous = std::mem::take(&mut alert.extra);
                    alert.extra = json!({ "value": previous, "resolution": text });
                }
            }
        }
        self.updated_at = now;
        Ok(&self.alerts[index])
    }

    /// Recompute every derived field from the primary fields.
    pub fn recalculate(&mut self, now: Timestamp) {
        self.total_duration = total_duration_minutes(self.join_time, self.leave_time, now);
        self.engagement.participation_score = participation_score(&self.engagement);
        let behavior = behavior_score(&self.activity_monitoring);
        self.calculated = CalculatedScores {
            behavior_score: behavior,
            engagement_level: engagement_level(self.engagement.participation_score),
            risk_level: risk_level(&self.alerts, behavior),
        };
    }
}

/// `Some(true)` when the details report a restored connection,
/// `Some(false)` when lost, `None` when unclear.
fn connection_state(details: &Value) -> Option<bool> {
    if let Some(status) = details.get("status").and_then(Value::as_str) {
        return match status.to_ascii_lowercase().as_str() {
            "disconnected" | "lost" | "offline" => Some(false),
            "connected" | "restored" | "online" | "reconnected" => Some(true),
            _ => None,
        };
    }
    details.get("connected").and_then(Value::as_bool)
}

/* --------------------------------------------------------------------------
Read models
-------------------------------------------------------------------------- */

/// Identity fields joined onto monitoring rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentIdentity {
    pub id: DbId,
    pub name: String,
    pub email: String,
}

/// One flattened row of the faculty monitoring dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardEntry {
    pub attendance_id: DbId,
    pub student: Option<StudentIdentity>,
    pub student_id: DbId,
    pub status: AttendanceStatus,
    pub location: Option<Location>,
    pub join_time: Option<Timestamp>,
    pub leave_time: Option<Timestamp>,
    pub total_duration: i64,
    pub activity_monitoring: ActivityMonitoring,
    pub engagement: Engagement,
    pub calculated: CalculatedScores,
    pub unresolved_alerts: usize,
    pub total_alerts: usize,
}

/// Build dashboard rows, most recent join first; never-joined records last.
pub fn dashboard_rows(
    records: Vec<Attendance>,
    identities: &HashMap<DbId, StudentIdentity>,
    now: Timestamp,
) -> Vec<DashboardEntry> {
    let mut rows: Vec<DashboardEntry> = records
        .into_iter()
        .map(|mut record| {
            record.recalculate(now);
            DashboardEntry {
                attendance_id: record.id,
                student: identities.get(&record.student_id).cloned(),
                student_id: record.student_id,
                status: record.status,
                unresolved_alerts: record.unresolved_alert_count(),
                total_alerts: record.alerts.len(),
                location: record.location,
                join_time: record.join_time,
                leave_time: record.leave_time,
                total_duration: record.total_duration,
                activity_monitoring: record.activity_monitoring,
                engagement: record.engagement,
                calculated: record.calculated,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.join_time.cmp(&a.join_time));
    rows
}

/// Aggregate figures over a session's attendance records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub total_records: i64,
    pub by_status: BTreeMap<String, i64>,
    pub average_behavior_score: f64,
    pub average_participation_score: f64,
    pub unresolved_alerts: i64,
    /// Records whose risk level is high or critical.
    pub at_risk: i64,
}

pub fn summarize(records: &[Attendance]) -> AttendanceSummary {
    let mut summary = AttendanceSummary {
        total_records: records.len() as i64,
        ..Default::default()
    };
    if records.is_empty() {
        return summary;
    }

    let mut behavior_total = 0i64;
    let mut participation_total = 0i64;
    for r in records {
        *summary
            .by_status
            .entry(r.status.as_str().to_string())
            .or_insert(0) += 1;
        behavior_total += i64::from(r.calculated.behavior_score);
        participation_total += i64::from(r.engagement.participation_score);
        summary.unresolved_alerts += r.unresolved_alert_count() as i64;
        if r.calculated.risk_level >= RiskLevel::High {
            summary.at_risk += 1;
        }
    }
    let n = records.len() as f64;
    summary.average_behavior_score = behavior_total as f64 / n;
    summary.average_participation_score = participation_total as f64 / n;
    summary
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
