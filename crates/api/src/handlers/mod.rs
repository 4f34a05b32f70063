//! Request handlers.
//!
//! Handlers are thin: they authenticate, validate the body, delegate to the
//! engine on [`AppState`](crate::state::AppState) and wrap the result in a
//! [`DataResponse`](crate::response::DataResponse). Errors map via
//! [`AppError`](crate::error::AppError).

pub mod attendance;
pub mod chat;
pub mod polls;
pub mod sessions;
