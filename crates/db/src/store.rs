//! Store traits.
//!
//! Each collection exposes single-document reads, inserts and versioned
//! replaces through [`DocumentStore`], plus the queries its engine needs.

use async_trait::async_trait;
use liveclass_core::attendance::{Attendance, AttendanceSummary};
use liveclass_core::chat::ChatMessage;
use liveclass_core::poll::Poll;
use liveclass_core::session::{ClassSession, SessionStatus};
use liveclass_core::types::DbId;

use crate::error::StoreResult;
use crate::models::user::User;

/// A stored entity with a database id and an optimistic-concurrency version.
pub trait Document: Clone + Send + Sync + 'static {
    fn id(&self) -> DbId;
    fn set_id(&mut self, id: DbId);
    fn version(&self) -> i32;
    fn set_version(&mut self, version: i32);
}

macro_rules! impl_document {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Document for $ty {
                fn id(&self) -> DbId {
                    self.id
                }
                fn set_id(&mut self, id: DbId) {
                    self.id = id;
                }
                fn version(&self) -> i32 {
                    self.version
                }
                fn set_version(&mut self, version: i32) {
                    self.version = version;
                }
            }
        )*
    };
}

impl_document!(ClassSession, Attendance, Poll, ChatMessage);

#[async_trait]
pub trait DocumentStore<T: Document>: Send + Sync {
    async fn get(&self, id: DbId) -> StoreResult<Option<T>>;

    /// Insert a new document. The store assigns the id and sets version 1.
    async fn insert(&self, doc: &T) -> StoreResult<T>;

    /// Replace the stored document if its version still equals `doc.version()`.
    ///
    /// Returns the saved document with the version bumped, or `None` when
    /// the document changed (or vanished) since it was read.
    async fn replace(&self, doc: &T) -> StoreResult<Option<T>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<User>>;

    /// Users with the given ids; unknown ids are skipped.
    async fn find_many(&self, ids: &[DbId]) -> StoreResult<Vec<User>>;
}

/// Scope and paging for a session listing. `None` fields do not filter.
#[derive(Debug, Clone)]
pub struct SessionFilter {
    pub college_id: Option<DbId>,
    pub faculty_id: Option<DbId>,
    pub enrolled_student: Option<DbId>,
    pub status: Option<SessionStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for SessionFilter {
    fn default() -> Self {
        Self {
            college_id: None,
            faculty_id: None,
            enrolled_student: None,
            status: None,
            limit: 50,
            offset: 0,
        }
    }
}

#[async_trait]
pub trait SessionStore: DocumentStore<ClassSession> {
    /// Matching sessions, latest scheduled start first.
    async fn list(&self, filter: &SessionFilter) -> StoreResult<Vec<ClassSession>>;
}

#[async_trait]
pub trait AttendanceStore: DocumentStore<Attendance> {
    async fn find(&self, session_id: DbId, student_id: DbId) -> StoreResult<Option<Attendance>>;

    async fn list_by_session(&self, session_id: DbId) -> StoreResult<Vec<Attendance>>;

    /// Aggregate figures over a session's records.
    async fn summary(&self, session_id: DbId) -> StoreResult<AttendanceSummary>;
}

#[async_trait]
pub trait PollStore: DocumentStore<Poll> {
    /// Polls of a session, newest first.
    async fn list_by_session(&self, session_id: DbId) -> StoreResult<Vec<Poll>>;

    /// Hard delete. Returns `true` if a row was removed.
    async fn delete(&self, id: DbId) -> StoreResult<bool>;
}

#[async_trait]
pub trait MessageStore: DocumentStore<ChatMessage> {
    /// Non-deleted messages of a session, newest first.
    async fn list_by_session(
        &self,
        session_id: DbId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ChatMessage>>;
}
