//! User model. Users are provisioned elsewhere and read-only here.

use liveclass_core::attendance::StudentIdentity;
use liveclass_core::roles::Role;
use liveclass_core::session::EnrollCandidate;
use liveclass_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub role: String,
    pub college_id: DbId,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// The user's role, or `None` for a role this system does not know.
    pub fn parsed_role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    pub fn identity(&self) -> StudentIdentity {
        StudentIdentity {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    /// Enrollment view of the user. Unknown roles are reported as `None`.
    pub fn enroll_candidate(&self) -> Option<EnrollCandidate> {
        Some(EnrollCandidate {
            user_id: self.id,
            role: self.parsed_role()?,
            college_id: self.college_id,
        })
    }
}
