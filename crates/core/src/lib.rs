//! Domain layer for the live-classroom backend.
//!
//! Everything in this crate is pure: entities, state transitions, derived
//! score calculations and validation. Callers pass the current time in and
//! persist the mutated values themselves, so every rule here is testable
//! without a database or a running server.

pub mod attendance;
pub mod chat;
pub mod error;
pub mod geo;
pub mod poll;
pub mod realtime;
pub mod roles;
pub mod session;
pub mod types;
