//! In-process implementation of every store trait.
//!
//! Mirrors the PostgreSQL semantics that engines rely on: ids are assigned
//! on insert, versions start at 1 and bump on every replace, replaces are
//! compare-and-swap, and attendance is unique per `(session, student)`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use liveclass_core::attendance::{summarize, Attendance, AttendanceSummary};
use liveclass_core::chat::ChatMessage;
use liveclass_core::poll::Poll;
use liveclass_core::roles::Role;
use liveclass_core::session::ClassSession;
use liveclass_core::types::DbId;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::models::user::User;
use crate::store::{
    AttendanceStore, Document, DocumentStore, MessageStore, PollStore, SessionFilter,
    SessionStore, UserStore,
};

const ATTENDANCE_UNIQUE: &str = "uq_attendance_session_student";

struct Collection<T> {
    next_id: DbId,
    docs: BTreeMap<DbId, T>,
}

impl<T: Document> Collection<T> {
    fn new() -> Self {
        Self {
            next_id: 1,
            docs: BTreeMap::new(),
        }
    }

    fn insert(&mut self, doc: &T) -> T {
        let mut stored = doc.clone();
        stored.set_id(self.next_id);
        stored.set_version(1);
        self.next_id += 1;
        self.docs.insert(stored.id(), stored.clone());
        stored
    }

    fn replace(&mut self, doc: &T) -> Option<T> {
        let current = self.docs.get_mut(&doc.id())?;
        if current.version() != doc.version() {
            return None;
        }
        let mut stored = doc.clone();
        stored.set_version(doc.version() + 1);
        *current = stored.clone();
        Some(stored)
    }
}

/// Every collection held in memory behind tokio `RwLock`s.
pub struct MemoryStore {
    users: RwLock<BTreeMap<DbId, User>>,
    sessions: RwLock<Collection<ClassSession>>,
    attendance: RwLock<Collection<Attendance>>,
    polls: RwLock<Collection<Poll>>,
    messages: RwLock<Collection<ChatMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            sessions: RwLock::new(Collection::new()),
            attendance: RwLock::new(Collection::new()),
            polls: RwLock::new(Collection::new()),
            messages: RwLock::new(Collection::new()),
        }
    }

    /// Provision a user. Users are otherwise read-only to this system.
    pub async fn insert_user(
        &self,
        name: &str,
        email: &str,
        role: Role,
        college_id: DbId,
    ) -> User {
        let mut users = self.users.write().await;
        let id = users.keys().next_back().map_or(1, |last| last + 1);
        let now = Utc::now();
        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
            college_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, user.clone());
        user
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[DbId]) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        let mut found: Vec<User> = ids.iter().filter_map(|id| users.get(id).cloned()).collect();
        found.sort_by_key(|u| u.id);
        found.dedup_by_key(|u| u.id);
        Ok(found)
    }
}

#[async_trait]
impl DocumentStore<ClassSession> for MemoryStore {
    async fn get(&self, id: DbId) -> StoreResult<Option<ClassSession>> {
        Ok(self.sessions.read().await.docs.get(&id).cloned())
    }

    async fn replace(&self, doc: &ClassSession) -> StoreResult<Option<ClassSession>> {
        Ok(self.sessions.write().await.replace(doc))
    }

    async fn insert(&self, doc: &ClassSession) -> StoreResult<ClassSession> {
        Ok(self.sessions.write().await.insert(doc))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn list(&self, filter: &SessionFilter) -> StoreResult<Vec<ClassSession>> {
        let sessions = self.sessions.read().await;
        let mut matching: Vec<ClassSession> = sessions
            .docs
            .values()
            .filter(|s| filter.college_id.map_or(true, |id| s.college_id == id))
            .filter(|s| filter.faculty_id.map_or(true, |id| s.faculty_id == id))
            .filter(|s| filter.enrolled_student.map_or(true, |id| s.is_enrolled(id)))
            .filter(|s| filter.status.map_or(true, |status| s.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.scheduled_start
                .cmp(&a.scheduled_start)
                .then(b.id.cmp(&a.id))
        });
        Ok(matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }
}

#[async_trait]
impl DocumentStore<Attendance> for MemoryStore {
    async fn get(&self, id: DbId) -> StoreResult<Option<Attendance>> {
        Ok(self.attendance.read().await.docs.get(&id).cloned())
    }

    async fn replace(&self, doc: &Attendance) -> StoreResult<Option<Attendance>> {
        Ok(self.attendance.write().await.replace(doc))
    }

    async fn insert(&self, doc: &Attendance) -> StoreResult<Attendance> {
        let mut attendance = self.attendance.write().await;
        let exists = attendance
            .docs
            .values()
            .any(|a| a.session_id == doc.session_id && a.student_id == doc.student_id);
        if exists {
            return Err(StoreError::Duplicate(ATTENDANCE_UNIQUE.to_string()));
        }
        Ok(attendance.insert(doc))
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find(&self, session_id: DbId, student_id: DbId) -> StoreResult<Option<Attendance>> {
        Ok(self
            .attendance
            .read()
            .await
            .docs
            .values()
            .find(|a| a.session_id == session_id && a.student_id == student_id)
            .cloned())
    }

    async fn list_by_session(&self, session_id: DbId) -> StoreResult<Vec<Attendance>> {
        Ok(self
            .attendance
            .read()
            .await
            .docs
            .values()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn summary(&self, session_id: DbId) -> StoreResult<AttendanceSummary> {
        let records = AttendanceStore::list_by_session(self, session_id).await?;
        Ok(summarize(&records))
    }
}

#[async_trait]
impl DocumentStore<Poll> for MemoryStore {
    async fn get(&self, id: DbId) -> StoreResult<Option<Poll>> {
        Ok(self.polls.read().await.docs.get(&id).cloned())
    }

    async fn replace(&self, doc: &Poll) -> StoreResult<Option<Poll>> {
        Ok(self.polls.write().await.replace(doc))
    }

    async fn insert(&self, doc: &Poll) -> StoreResult<Poll> {
        Ok(self.polls.write().await.insert(doc))
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn list_by_session(&self, session_id: DbId) -> StoreResult<Vec<Poll>> {
        let polls = self.polls.read().await;
        let mut matching: Vec<Poll> = polls
            .docs
            .values()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(matching)
    }

    async fn delete(&self, id: DbId) -> StoreResult<bool> {
        Ok(self.polls.write().await.docs.remove(&id).is_some())
    }
}

#[async_trait]
impl DocumentStore<ChatMessage> for MemoryStore {
    async fn get(&self, id: DbId) -> StoreResult<Option<ChatMessage>> {
        Ok(self.messages.read().await.docs.get(&id).cloned())
    }

    async fn replace(&self, doc: &ChatMessage) -> StoreResult<Option<ChatMessage>> {
        Ok(self.messages.write().await.replace(doc))
    }

    async fn insert(&self, doc: &ChatMessage) -> StoreResult<ChatMessage> {
        Ok(self.messages.write().await.insert(doc))
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn list_by_session(
        &self,
        session_id: DbId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ChatMessage>> {
        let messages = self.messages.read().await;
        let mut matching: Vec<ChatMessage> = messages
            .docs
            .values()
            .filter(|m| m.session_id == session_id && !m.is_deleted)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use liveclass_core::session::{NewSession, SessionSettings, SessionStatus};

    fn session(faculty_id: DbId, start_offset_hours: i64) -> ClassSession {
        let now = Utc::now();
        ClassSession::new(
            NewSession {
                title: "Operating Systems".into(),
                description: None,
                subject: "CS".into(),
                scheduled_start: now + Duration::hours(start_offset_hours),
                scheduled_end: None,
                duration_minutes: 60,
                settings: SessionSettings::default(),
            },
            faculty_id,
            1,
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_id_and_version() {
        let store = MemoryStore::new();
        let a = DocumentStore::<ClassSession>::insert(&store, &session(10, 1)).await.unwrap();
        let b = DocumentStore::<ClassSession>::insert(&store, &session(10, 2)).await.unwrap();
        assert_eq!((a.id, a.version), (1, 1));
        assert_eq!((b.id, b.version), (2, 1));
    }

    #[tokio::test]
    async fn replace_is_compare_and_swap() {
        let store = MemoryStore::new();
        let saved = DocumentStore::<ClassSession>::insert(&store, &session(10, 1)).await.unwrap();

        let mut first = saved.clone();
        first.title = "First writer".into();
        let mut second = saved.clone();
        second.title = "Second writer".into();

        let won = store.replace(&first).await.unwrap().expect("first write wins");
        assert_eq!(won.version, 2);
        assert!(store.replace(&second).await.unwrap().is_none());

        let current = DocumentStore::<ClassSession>::get(&store, saved.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.title, "First writer");
    }

    #[tokio::test]
    async fn attendance_is_unique_per_student() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert(&Attendance::new(1, 7, now)).await.unwrap();
        let err = store.insert(&Attendance::new(1, 7, now)).await.unwrap_err();
        assert_matches!(err, StoreError::Duplicate(name) if name == ATTENDANCE_UNIQUE);
        assert!(store.insert(&Attendance::new(2, 7, now)).await.is_ok());
    }

    #[tokio::test]
    async fn session_list_filters_and_orders() {
        let store = MemoryStore::new();
        DocumentStore::<ClassSession>::insert(&store, &session(10, 1)).await.unwrap();
        DocumentStore::<ClassSession>::insert(&store, &session(11, 3)).await.unwrap();
        let mut cancelled = session(10, 2);
        cancelled.status = SessionStatus::Cancelled;
        DocumentStore::<ClassSession>::insert(&store, &cancelled).await.unwrap();

        let mine = store
            .list(&SessionFilter {
                faculty_id: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<_> = mine.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1]);

        let scheduled = store
            .list(&SessionFilter {
                status: Some(SessionStatus::Scheduled),
                limit: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].id, 2);
    }

    #[tokio::test]
    async fn users_are_found_in_bulk() {
        let store = MemoryStore::new();
        let a = store.insert_user("Asha", "asha@example.edu", Role::Student, 1).await;
        let b = store.insert_user("Ben", "ben@example.edu", Role::Faculty, 1).await;
        let found = store.find_many(&[b.id, 99, a.id, a.id]).await.unwrap();
        let ids: Vec<_> = found.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(found[1].parsed_role(), Some(Role::Faculty));
    }
}
