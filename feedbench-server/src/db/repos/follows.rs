//! Follow edge repository
//!
//! Edges are keyed on `(source_id, target_id)`. Inserts use
//! `ON CONFLICT DO NOTHING`, so following twice is a no-op.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use crate::error::Result;
use crate::models::{FeedKey, User, UserRow};

/// A followed user together with when the follow happened.
#[derive(Debug, Clone)]
pub struct Followed {
    pub user: User,
    pub followed_at: DateTime<Utc>,
}

impl Followed {
    /// Position in the newest-follow-first sequence.
    pub fn feed_key(&self) -> FeedKey {
        FeedKey::new(self.followed_at, self.user.user_id.clone())
    }
}

#[derive(FromRow)]
struct FollowedRow {
    followed_at: DateTime<Utc>,
    #[sqlx(flatten)]
    user: UserRow,
}

/// Follow edge repository over one connection or transaction
pub struct FollowRepo<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> FollowRepo<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert the edge if absent. Returns whether a row was written.
    pub async fn insert(
        &mut self,
        source_id: &str,
        target_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO follows (source_id, target_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(source_id)
        .bind(target_id)
        .bind(created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Whether `source_id` follows `target_id`.
    pub async fn exists(&mut self, source_id: &str, target_id: &str) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE source_id = $1 AND target_id = $2)",
        )
        .bind(source_id)
        .bind(target_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(exists.0)
    }

    /// Ids of every user `source_id` follows.
    pub async fn target_ids(&mut self, source_id: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT target_id
            FROM follows
            WHERE source_id = $1
            ORDER BY target_id
            "#,
        )
        .bind(source_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(ids)
    }

    /// Users followed by `source_id`, newest follow first, strictly after `after`.
    ///
    /// Edges whose target user no longer exists are skipped.
    pub async fn page_followed(
        &mut self,
        source_id: &str,
        after: Option<&FeedKey>,
        limit: i64,
    ) -> Result<Vec<Followed>> {
        let rows: Vec<FollowedRow> = match after {
            None => {
                sqlx::query_as(
                    r#"
                    SELECT f.created_at AS followed_at,
                           u.user_id, u.user_name, u.role, u.created_at
                    FROM follows f
                    JOIN users u ON u.user_id = f.target_id
                    WHERE f.source_id = $1
                    ORDER BY f.created_at DESC, f.target_id DESC
                    LIMIT $2
                    "#,
                )
                .bind(source_id)
                .bind(limit)
                .fetch_all(&mut *self.conn)
                .await?
            }
            Some(key) => {
                sqlx::query_as(
                    r#"
                    SELECT f.created_at AS followed_at,
                           u.user_id, u.user_name, u.role, u.created_at
                    FROM follows f
                    JOIN users u ON u.user_id = f.target_id
                    WHERE f.source_id = $1
                      AND (f.created_at, f.target_id) < ($2, $3)
                    ORDER BY f.created_at DESC, f.target_id DESC
                    LIMIT $4
                    "#,
                )
                .bind(source_id)
                .bind(key.created_at)
                .bind(&key.id)
                .bind(limit)
                .fetch_all(&mut *self.conn)
                .await?
            }
        };

        rows.into_iter()
            .map(|row| {
                Ok(Followed {
                    followed_at: row.followed_at,
                    user: row.user.try_into()?,
                })
            })
            .collect()
    }
}
