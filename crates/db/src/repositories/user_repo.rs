//! Repository for the `users` table.

use async_trait::async_trait;
use liveclass_core::types::DbId;
use sqlx::PgPool;

use crate::error::StoreResult;
use crate::models::user::User;
use crate::store::UserStore;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, email, role, college_id, is_active, created_at, updated_at";

/// Read access to users.
pub struct UserRepo {
    pool: PgPool,
}

impl UserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepo {
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<User>> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_many(&self, ids: &[DbId]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = ANY($1) ORDER BY id");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?)
    }
}
