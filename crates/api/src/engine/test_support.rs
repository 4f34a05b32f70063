//! Engine test fixture: an in-memory store, a live event bus and a small cast
//! of users in college 1 (plus one student from college 2).

use std::sync::Arc;

use chrono::{Duration, Utc};
use liveclass_core::roles::{Principal, Role};
use liveclass_core::session::{ClassSession, NewSession, SessionAction, SessionSettings};
use liveclass_db::{Datastore, MemoryStore};
use liveclass_events::EventBus;

use crate::auth::jwt::JwtConfig;
use crate::config::ServerConfig;
use crate::state::AppState;
use crate::ws::WsManager;

pub(crate) struct Fixture {
    pub state: AppState,
    pub admin: Principal,
    pub faculty: Principal,
    pub student: Principal,
    pub other_student: Principal,
    pub foreign_student: Principal,
}

async fn principal(memory: &MemoryStore, name: &str, role: Role, college_id: i64) -> Principal {
    let email = format!("{}@example.edu", name.to_lowercase());
    let user = memory.insert_user(name, &email, role, college_id).await;
    Principal::new(user.id, role, college_id)
}

impl Fixture {
    pub async fn new() -> Self {
        let memory = Arc::new(MemoryStore::new());
        let admin = principal(&memory, "Root", Role::Admin, 1).await;
        let faculty = principal(&memory, "Grace", Role::Faculty, 1).await;
        let student = principal(&memory, "Ada", Role::Student, 1).await;
        let other_student = principal(&memory, "Alan", Role::Student, 1).await;
        let foreign_student = principal(&memory, "Edsger", Role::Student, 2).await;

        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: vec![],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 1,
            ws_heartbeat_secs: 30,
            database_url: None,
            jwt: JwtConfig {
                secret: "engine-test-secret".into(),
                access_token_expiry_mins: 5,
            },
        };
        let state = AppState::new(
            Datastore::in_memory(memory),
            Arc::new(config),
            Arc::new(WsManager::new()),
            Arc::new(EventBus::default()),
        );

        Self {
            state,
            admin,
            faculty,
            student,
            other_student,
            foreign_student,
        }
    }

    pub fn new_session_input() -> NewSession {
        NewSession {
            title: "Operating Systems".into(),
            description: None,
            subject: "CS".into(),
            scheduled_start: Utc::now() + Duration::hours(1),
            scheduled_end: None,
            duration_minutes: 60,
            settings: SessionSettings::default(),
        }
    }

    pub async fn scheduled_session(&self) -> ClassSession {
        self.state
            .sessions
            .create(&self.faculty, Self::new_session_input())
            .await
            .unwrap()
    }

    /// A live session with `student` and `other_student` enrolled, nobody present.
    pub async fn live_session_with_student(&self) -> ClassSession {
        let session = self.scheduled_session().await;
        self.state
            .sessions
            .enroll(
                &self.faculty,
                session.id,
                &[self.student.user_id, self.other_student.user_id],
            )
            .await
            .unwrap();
        self.state
            .sessions
            .transition(&self.faculty, session.id, SessionAction::Start)
            .await
            .unwrap()
    }
}
