//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated principal from a JWT Bearer token.
//! - [`rbac::RequireStaff`] -- Requires the `faculty` or `admin` role.

pub mod auth;
pub mod rbac;
