//! Engines: load a document, apply a pure `liveclass_core` transition,
//! persist it with a version check and publish the outcome to the session
//! room.
//!
//! Every read-modify-write goes through [`modify`]. A lost race reloads the
//! document and re-applies the transition; after [`MAX_CAS_ATTEMPTS`] lost
//! races the caller gets a `Conflict`. Cross-document side effects (attendance
//! bookkeeping triggered by a join, a vote or a chat message) go through
//! [`best_effort`] and never fail the primary operation.

mod attendance;
mod chat;
mod polls;
mod sessions;
#[cfg(test)]
mod test_support;

pub use attendance::{ActivityReceipt, AttendanceEngine, ManualAlert};
pub use chat::{ChatEngine, OutgoingMessage};
pub use polls::{PollEngine, VoteRequest};
pub use sessions::{JoinReceipt, SessionEngine};

use liveclass_core::error::CoreError;
use liveclass_core::types::DbId;
use liveclass_db::{Document, DocumentStore};

use crate::error::{AppError, AppResult};

/// Attempts made by [`modify`] before reporting a conflict.
pub const MAX_CAS_ATTEMPTS: u32 = 5;

/// Load a document or fail with `NotFound`.
pub(crate) async fn load<T, S>(store: &S, entity: &'static str, id: DbId) -> AppResult<T>
where
    T: Document,
    S: DocumentStore<T> + ?Sized,
{
    store
        .get(id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity, id).into())
}

/// Apply `apply` to the current version of a document and save it.
///
/// Domain errors from `apply` abort without writing. Returns the saved
/// document together with whatever `apply` returned on the winning attempt.
pub(crate) async fn modify<T, S, F, R>(
    store: &S,
    entity: &'static str,
    id: DbId,
    mut apply: F,
) -> AppResult<(T, R)>
where
    T: Document,
    S: DocumentStore<T> + ?Sized,
    F: FnMut(&mut T) -> Result<R, CoreError> + Send,
    R: Send,
{
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let mut doc: T = load(store, entity, id).await?;
        let outcome = apply(&mut doc)?;
        match store.replace(&doc).await? {
            Some(saved) => return Ok((saved, outcome)),
            None => {
                tracing::debug!(entity, id, attempt, "Version conflict, retrying");
            }
        }
    }

    tracing::warn!(
        entity,
        id,
        attempts = MAX_CAS_ATTEMPTS,
        "Gave up after repeated version conflicts"
    );
    Err(AppError::Core(CoreError::Conflict(format!(
        "{entity} {id} is being modified concurrently, try again"
    ))))
}

/// Swallow the failure of a secondary side effect, logging it at warn.
pub(crate) fn best_effort<T>(result: AppResult<T>, action: &'static str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(error = %err, action, "Side effect failed, continuing");
            None
        }
    }
}
