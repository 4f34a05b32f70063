//! Persistence for the live-classroom backend.
//!
//! Every collection is a document store keyed by a `BIGSERIAL` id and
//! carrying a `version` column. Writers replace whole documents with a
//! compare-and-swap on that version; a lost race surfaces as `Ok(None)` and
//! the caller reloads and retries.
//!
//! - [`store`] -- the store traits engines program against.
//! - [`repositories`] -- PostgreSQL implementations (sqlx).
//! - [`memory`] -- in-process implementation for tests and database-less
//!   development.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::{
    AttendanceStore, Document, DocumentStore, MessageStore, PollStore, SessionFilter,
    SessionStore, UserStore,
};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run a trivial query to verify the pool can reach the database.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}

/// All collections behind one cheaply cloneable handle.
#[derive(Clone)]
pub struct Datastore {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub attendance: Arc<dyn AttendanceStore>,
    pub polls: Arc<dyn PollStore>,
    pub messages: Arc<dyn MessageStore>,
    pool: Option<DbPool>,
}

impl Datastore {
    /// PostgreSQL-backed store.
    pub fn postgres(pool: DbPool) -> Self {
        use repositories::{AttendanceRepo, MessageRepo, PollRepo, SessionRepo, UserRepo};

        Self {
            users: Arc::new(UserRepo::new(pool.clone())),
            sessions: Arc::new(SessionRepo::new(pool.clone())),
            attendance: Arc::new(AttendanceRepo::new(pool.clone())),
            polls: Arc::new(PollRepo::new(pool.clone())),
            messages: Arc::new(MessageRepo::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Store every collection in `memory`.
    pub fn in_memory(memory: Arc<MemoryStore>) -> Self {
        Self {
            users: memory.clone(),
            sessions: memory.clone(),
            attendance: memory.clone(),
            polls: memory.clone(),
            messages: memory,
            pool: None,
        }
    }

    /// Backend name reported by the health endpoint.
    pub fn backend(&self) -> &'static str {
        if self.pool.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }

    /// Verify the backing store is reachable.
    pub async fn ping(&self) -> StoreResult<()> {
        match &self.pool {
            Some(pool) => Ok(health_check(pool).await?),
            None => Ok(()),
        }
    }
}
