//! Post repository
//!
//! Posts are append-only. Feed reads are keyset queries ordered by
//! `(created_at DESC, post_id DESC)`, served by `posts_owner_feed_idx`.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::Result;
use crate::models::{FeedKey, Post, PostContent};

/// Post repository over one connection or transaction
pub struct PostRepo<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PostRepo<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert a post. The owner is not checked for existence.
    pub async fn create(
        &mut self,
        post_id: &str,
        owner_id: &str,
        content: &PostContent,
        created_at: DateTime<Utc>,
    ) -> Result<Post> {
        let post: Post = sqlx::query_as(
            r#"
            INSERT INTO posts (post_id, owner_id, created_at, content)
            VALUES ($1, $2, $3, $4)
            RETURNING post_id, owner_id, created_at, content
            "#,
        )
        .bind(post_id)
        .bind(owner_id)
        .bind(created_at)
        .bind(content.as_str())
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(post)
    }

    /// Get a single post by id.
    pub async fn get(&mut self, post_id: &str) -> Result<Option<Post>> {
        let post: Option<Post> = sqlx::query_as(
            r#"
            SELECT post_id, owner_id, created_at, content
            FROM posts
            WHERE post_id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(post)
    }

    pub async fn exists(&mut self, post_id: &str) -> Result<bool> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM posts WHERE post_id = $1)")
                .bind(post_id)
                .fetch_one(&mut *self.conn)
                .await?;
        Ok(exists.0)
    }

    /// Newest-first posts by any of `owners`, strictly after `after`.
    ///
    /// Returns at most `limit` rows already in feed order.
    pub async fn page_by_owners(
        &mut self,
        owners: &[String],
        after: Option<&FeedKey>,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let posts: Vec<Post> = match after {
            None => {
                sqlx::query_as(
                    r#"
                    SELECT post_id, owner_id, created_at, content
                    FROM posts
                    WHERE owner_id = ANY($1)
                    ORDER BY created_at DESC, post_id DESC
                    LIMIT $2
                    "#,
                )
                .bind(owners)
                .bind(limit)
                .fetch_all(&mut *self.conn)
                .await?
            }
            Some(key) => {
                sqlx::query_as(
                    r#"
                    SELECT post_id, owner_id, created_at, content
                    FROM posts
                    WHERE owner_id = ANY($1)
                      AND (created_at, post_id) < ($2, $3)
                    ORDER BY created_at DESC, post_id DESC
                    LIMIT $4
                    "#,
                )
                .bind(owners)
                .bind(key.created_at)
                .bind(&key.id)
                .bind(limit)
                .fetch_all(&mut *self.conn)
                .await?
            }
        };

        Ok(posts)
    }
}
