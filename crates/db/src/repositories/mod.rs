//! PostgreSQL repositories.
//!
//! Each repository owns a clone of the pool and implements the matching
//! store trait. Queries are built at runtime from a shared column list.

pub mod attendance_repo;
pub mod message_repo;
pub mod poll_repo;
pub mod session_repo;
pub mod user_repo;

pub use attendance_repo::AttendanceRepo;
pub use message_repo::MessageRepo;
pub use poll_repo::PollRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
