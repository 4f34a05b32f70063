//! HTTP and WebSocket surface of the live-classroom backend.
//!
//! Engines in [`engine`] own the load / apply / persist / broadcast cycle;
//! handlers and the socket dispatcher are thin adapters over them.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod response;
pub mod routes;
pub mod state;
pub mod ws;
