//! Row models and their conversions to and from domain entities.
//!
//! Nested sub-documents (roster, alerts, options, reactions, ...) live in
//! JSONB columns and are decoded through [`sqlx::types::Json`]. Enum
//! columns hold the same snake_case names the JSON API uses.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

pub mod attendance;
pub mod chat_message;
pub mod class_session;
pub mod poll;
pub mod user;

/// Text form of a serde enum, e.g. `SessionStatus::Live` -> `"live"`.
pub(crate) fn enum_to_text<T: Serialize>(value: &T) -> StoreResult<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(StoreError::Decode(format!(
            "expected a string enum, got {other}"
        ))),
    }
}

/// Parse a text column back into a serde enum.
pub(crate) fn text_to_enum<T: DeserializeOwned>(column: &str, text: &str) -> StoreResult<T> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|_| StoreError::Decode(format!("invalid {column} value '{text}'")))
}
