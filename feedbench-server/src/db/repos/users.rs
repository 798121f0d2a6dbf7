//! User repository
//!
//! - create: plain INSERT; a name collision surfaces as `AlreadyExists`
//! - get: point lookup, `None` when absent
//! - exists: used for follow preconditions inside a transaction

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::{FeedError, Result};
use crate::models::{Role, User, UserName, UserRow};

/// User repository over one connection or transaction
pub struct UserRepo<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> UserRepo<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert a new user.
    pub async fn create(
        &mut self,
        user_id: &str,
        name: &UserName,
        role: Role,
        created_at: DateTime<Utc>,
    ) -> Result<User> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (user_id, user_name, created_at, role)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, user_name, role, created_at
            "#,
        )
        .bind(user_id)
        .bind(name.as_str())
        .bind(created_at)
        .bind(role.as_str())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| FeedError::unique("user name", name.as_str(), e))?;

        row.try_into()
    }

    /// Get a user by id.
    pub async fn get(&mut self, user_id: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT user_id, user_name, role, created_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(User::try_from).transpose()
    }

    pub async fn exists(&mut self, user_id: &str) -> Result<bool> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *self.conn)
                .await?;
        Ok(exists.0)
    }
}

