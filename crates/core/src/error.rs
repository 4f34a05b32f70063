use std::fmt;

/// Coarse error category shared by every layer.
///
/// HTTP status mapping and client-facing behaviour key off the kind, while
/// the individual [`CoreError`] variants carry the stable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Unauthorized,
    InvalidState,
    ValidationFailed,
    Conflict,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Option index {index} is out of range (poll has {len} options)")]
    InvalidOption { index: i64, len: usize },

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("A verified location is required before joining this session")]
    LocationRequired,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("You have already voted on this poll")]
    AlreadyVoted,

    #[error("You have already responded to this poll")]
    AlreadyResponded,

    #[error("Session has reached its maximum of {max} concurrent students")]
    SessionFull { max: i32 },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Late join rejected: {minutes_late} minutes after start exceeds the {cutoff_minutes} minute cutoff")]
    LateJoinRejected {
        minutes_late: i64,
        cutoff_minutes: i64,
    },

    #[error("Poll is not active")]
    PollInactive,

    #[error("Poll has expired")]
    PollExpired,

    #[error("Poll is already closed")]
    AlreadyClosed,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("You are not enrolled in this session")]
    NotEnrolled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Forbidden(_) | CoreError::NotEnrolled => ErrorKind::PermissionDenied,
            CoreError::Unauthorized(_) => ErrorKind::Unauthorized,
            CoreError::InvalidState(_)
            | CoreError::LateJoinRejected { .. }
            | CoreError::PollInactive
            | CoreError::PollExpired
            | CoreError::AlreadyClosed => ErrorKind::InvalidState,
            CoreError::Validation(_)
            | CoreError::InvalidOption { .. }
            | CoreError::InvalidCoordinate(_)
            | CoreError::LocationRequired => ErrorKind::ValidationFailed,
            CoreError::Conflict(_)
            | CoreError::AlreadyVoted
            | CoreError::AlreadyResponded
            | CoreError::SessionFull { .. } => ErrorKind::Conflict,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable error code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::InvalidOption { .. } => "INVALID_OPTION",
            CoreError::InvalidCoordinate(_) => "INVALID_COORDINATE",
            CoreError::LocationRequired => "LOCATION_REQUIRED",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::AlreadyVoted => "ALREADY_VOTED",
            CoreError::AlreadyResponded => "ALREADY_RESPONDED",
            CoreError::SessionFull { .. } => "SESSION_FULL",
            CoreError::InvalidState(_) => "INVALID_STATE",
            CoreError::LateJoinRejected { .. } => "LATE_JOIN_REJECTED",
            CoreError::PollInactive => "POLL_INACTIVE",
            CoreError::PollExpired => "POLL_EXPIRED",
            CoreError::AlreadyClosed => "ALREADY_CLOSED",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::NotEnrolled => "NOT_ENROLLED",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_entity_and_id() {
        let err = CoreError::not_found("Poll", 42);
        assert_eq!(err.to_string(), "Poll with id 42 not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn vote_errors_are_conflicts() {
        assert_eq!(CoreError::AlreadyVoted.kind(), ErrorKind::Conflict);
        assert_eq!(CoreError::AlreadyResponded.kind(), ErrorKind::Conflict);
        assert_eq!(CoreError::AlreadyVoted.code(), "ALREADY_VOTED");
    }

    #[test]
    fn poll_lifecycle_errors_are_invalid_state() {
        assert_eq!(CoreError::PollInactive.kind(), ErrorKind::InvalidState);
        assert_eq!(CoreError::PollExpired.kind(), ErrorKind::InvalidState);
        assert_eq!(CoreError::AlreadyClosed.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn bad_input_is_validation_failed() {
        let err = CoreError::InvalidOption { index: 2, len: 2 };
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(err.code(), "INVALID_OPTION");
        assert_eq!(
            CoreError::InvalidCoordinate("lat".into()).kind(),
            ErrorKind::ValidationFailed
        );
    }

    #[test]
    fn not_enrolled_is_permission_denied() {
        assert_eq!(CoreError::NotEnrolled.kind(), ErrorKind::PermissionDenied);
    }
}
