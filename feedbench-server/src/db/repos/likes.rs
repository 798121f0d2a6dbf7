//! Like edge repository
//!
//! Like counts are always aggregated from the edge rows; nothing is cached
//! or denormalized.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use crate::error::Result;

/// Live like aggregate for one post, relative to a caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeStats {
    pub like_count: i64,
    pub liked_by_caller: bool,
}

#[derive(FromRow)]
struct LikeStatsRow {
    post_id: String,
    like_count: i64,
    liked_by_caller: bool,
}

/// Like edge repository over one connection or transaction
pub struct LikeRepo<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> LikeRepo<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert the edge if absent. Returns whether a row was written.
    pub async fn insert(
        &mut self,
        post_id: &str,
        user_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO likes (post_id, user_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn count(&mut self, post_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }

    pub async fn exists(&mut self, post_id: &str, user_id: &str) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE post_id = $1 AND user_id = $2)",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(exists.0)
    }

    /// Like aggregates for many posts in one query.
    ///
    /// Posts without likes are absent from the map.
    pub async fn stats(
        &mut self,
        post_ids: &[String],
        caller_id: &str,
    ) -> Result<HashMap<String, LikeStats>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<LikeStatsRow> = sqlx::query_as(
            r#"
            SELECT post_id,
                   COUNT(*) AS like_count,
                   BOOL_OR(user_id = $2) AS liked_by_caller
            FROM likes
            WHERE post_id = ANY($1)
            GROUP BY post_id
            "#,
        )
        .bind(post_ids)
        .bind(caller_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.post_id,
                    LikeStats {
                        like_count: r.like_count,
                        liked_by_caller: r.liked_by_caller,
                    },
                )
            })
            .collect())
    }
}
