//! Well-known roles and the authenticated principal of a call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_FACULTY: &str = "faculty";
pub const ROLE_STUDENT: &str = "student";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Faculty,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => ROLE_ADMIN,
            Role::Faculty => ROLE_FACULTY,
            Role::Student => ROLE_STUDENT,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ROLE_ADMIN => Ok(Role::Admin),
            ROLE_FACULTY => Ok(Role::Faculty),
            ROLE_STUDENT => Ok(Role::Student),
            other => Err(CoreError::Validation(format!(
                "Invalid role '{other}'. Must be one of: {ROLE_ADMIN}, {ROLE_FACULTY}, {ROLE_STUDENT}"
            ))),
        }
    }
}

/// The authenticated caller of a core operation.
///
/// Supplied by the identity context on every request; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: DbId,
    pub role: Role,
    pub college_id: DbId,
}

impl Principal {
    pub fn new(user_id: DbId, role: Role, college_id: DbId) -> Self {
        Self {
            user_id,
            role,
            college_id,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    /// Faculty or admin.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Faculty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Admin, Role::Faculty, Role::Student] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "teacher".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("Invalid role"));
    }

    #[test]
    fn staff_covers_faculty_and_admin() {
        assert!(Principal::new(1, Role::Admin, 1).is_staff());
        assert!(Principal::new(1, Role::Faculty, 1).is_staff());
        assert!(!Principal::new(1, Role::Student, 1).is_staff());
    }
}
