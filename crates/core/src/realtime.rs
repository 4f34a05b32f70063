//! Real-time vocabulary: room keys, event names and the WebSocket message
//! envelope shared by the broadcaster and the socket handler.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::MessageType;
use crate::types::{DbId, Timestamp};

/* --------------------------------------------------------------------------
Rooms
-------------------------------------------------------------------------- */

/// Room every participant of a session is subscribed to.
pub fn session_room(session_id: DbId) -> String {
    format!("session-{session_id}")
}

/// Room carrying monitoring traffic for the owning faculty and admins only.
pub fn monitor_room(session_id: DbId) -> String {
    format!("session-{session_id}-monitor")
}

/// Session id encoded in a room key, for either room kind.
pub fn parse_room(room: &str) -> Option<DbId> {
    let rest = room.strip_prefix("session-")?;
    let id = rest.strip_suffix("-monitor").unwrap_or(rest);
    id.parse().ok()
}

/* --------------------------------------------------------------------------
Event names
-------------------------------------------------------------------------- */

pub mod events {
    pub const SESSION_STARTED: &str = "session_started";
    pub const SESSION_PAUSED: &str = "session_paused";
    pub const SESSION_RESUMED: &str = "session_resumed";
    pub const SESSION_ENDED: &str = "session_ended";
    pub const SESSION_CANCELLED: &str = "session_cancelled";
    pub const SESSION_UPDATED: &str = "session_updated";
    pub const STUDENTS_ENROLLED: &str = "students_enrolled";
    pub const STUDENT_JOINED: &str = "student_joined";
    pub const STUDENT_LEFT: &str = "student_left";

    pub const MONITORING_ALERT: &str = "monitoring_alert";
    pub const ALERT_RESOLVED: &str = "alert_resolved";
    pub const STUDENT_DISCONNECTED: &str = "student_disconnected";

    pub const POLL_CREATED: &str = "poll_created";
    pub const POLL_UPDATED: &str = "poll_updated";
    pub const POLL_CLOSED: &str = "poll_closed";
    pub const POLL_DELETED: &str = "poll_deleted";

    pub const NEW_MESSAGE: &str = "new_message";
    pub const MESSAGE_EDITED: &str = "message_edited";
    pub const MESSAGE_DELETED: &str = "message_deleted";
    pub const REACTION_UPDATED: &str = "reaction_updated";
}

/* --------------------------------------------------------------------------
Socket envelope
-------------------------------------------------------------------------- */

/// Inbound socket message. Each variant mirrors a REST operation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinSession {
        session_id: DbId,
    },
    LeaveSession {
        session_id: DbId,
    },
    PollVote {
        poll_id: DbId,
        #[serde(default)]
        option_index: Option<i64>,
        #[serde(default)]
        text_response: Option<String>,
        #[serde(default)]
        response_time: Option<f64>,
    },
    SendMessage {
        session_id: DbId,
        content: String,
        #[serde(default)]
        message_type: MessageType,
        #[serde(default)]
        reply_to: Option<DbId>,
    },
    EditMessage {
        message_id: DbId,
        content: String,
    },
    DeleteMessage {
        message_id: DbId,
    },
    AddReaction {
        message_id: DbId,
        emoji: String,
    },
    RemoveReaction {
        message_id: DbId,
        emoji: String,
    },
    MarkRead {
        message_id: DbId,
    },
    Activity {
        session_id: DbId,
        activity_type: String,
        #[serde(default)]
        details: Value,
    },
    LocationUpdate {
        session_id: DbId,
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        address: Option<String>,
        #[serde(default)]
        accuracy: Option<f64>,
    },
    Ping,
}

impl ClientMessage {
    /// Wire name of the message, echoed back in `ack` and `error` replies.
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::JoinSession { .. } => "join_session",
            ClientMessage::LeaveSession { .. } => "leave_session",
            ClientMessage::PollVote { .. } => "poll_vote",
            ClientMessage::SendMessage { .. } => "send_message",
            ClientMessage::EditMessage { .. } => "edit_message",
            ClientMessage::DeleteMessage { .. } => "delete_message",
            ClientMessage::AddReaction { .. } => "add_reaction",
            ClientMessage::RemoveReaction { .. } => "remove_reaction",
            ClientMessage::MarkRead { .. } => "mark_read",
            ClientMessage::Activity { .. } => "activity",
            ClientMessage::LocationUpdate { .. } => "location_update",
            ClientMessage::Ping => "ping",
        }
    }
}

/// Outbound socket message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ack {
        request: String,
        data: Value,
    },
    Error {
        request: Option<String>,
        code: String,
        message: String,
    },
    Event {
        room: String,
        event: String,
        payload: Value,
        timestamp: Timestamp,
    },
    Pong,
}
