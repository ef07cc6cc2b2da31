use crate::database::error::DatabaseError;
use crate::error::AppResult;
use crate::services::host::{User, UserDirectory};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: i64,
    phone1: Option<String>,
    phone2: Option<String>,
    country: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            phone1: row.phone1,
            phone2: row.phone2,
            country: row.country,
        }
    }
}

/// Read-only view of the host's users
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn get_user(&self, user_id: i64) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, phone1, phone2, country FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(User::from))
    }
}
