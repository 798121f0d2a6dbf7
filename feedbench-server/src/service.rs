//! The feed service contract and its Postgres implementation
//!
//! [`FeedService`] is the capability every backing store must provide;
//! [`PgFeedServer`] satisfies it statically. Each operation validates its
//! input, then runs under the connection manager's deadline on its own
//! connection (reads) or transaction (guarded writes).

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgConnection;

use crate::clock::{Clock, SystemClock};
use crate::config::ConnOptions;
use crate::db::{ConnectionManager, FollowRepo, LikeRepo, PostRepo, UserRepo};
use crate::engine::{ConsistencyEngine, FollowEdge, LikeEdge};
use crate::error::{FeedError, Result};
use crate::feed::{cursor, CursorScope, FeedPaginator, PgPostSource};
use crate::ids::{IdGenerator, UuidGenerator};
use crate::models::{
    require, FeedRequest, Page, PageParams, PostContent, PostView, Role, User, UserName,
    UserView, DEFAULT_LIMIT,
};

/// Operations served by a feed store.
#[async_trait]
pub trait FeedService: Send + Sync + 'static {
    /// Create a user. Fails with `AlreadyExists` on a name collision.
    async fn create_user(&self, user_name: &str, role: &str) -> Result<User>;

    /// Look up a user as seen by `caller_id`.
    async fn get_user(&self, caller_id: &str, user_id: &str) -> Result<Option<UserView>>;

    /// Make `caller_id` follow `target_id`. Idempotent.
    async fn follow_user(&self, caller_id: &str, target_id: &str) -> Result<()>;

    /// Publish a post owned by `caller_id`.
    async fn create_post(&self, caller_id: &str, content: &str) -> Result<PostView>;

    /// Look up a post as seen by `caller_id`.
    async fn get_post(&self, caller_id: &str, post_id: &str) -> Result<Option<PostView>>;

    /// Like a post (idempotent) and return its updated view.
    async fn like_post(&self, caller_id: &str, post_id: &str) -> Result<PostView>;

    /// Posts by `owner_id`, newest first.
    async fn get_user_feed(
        &self,
        caller_id: &str,
        owner_id: &str,
        page: PageParams,
    ) -> Result<Page<PostView>>;

    /// Posts by everyone `caller_id` follows, newest first.
    async fn get_followed_feed(&self, caller_id: &str, page: PageParams) -> Result<Page<PostView>>;

    /// Users `caller_id` follows, most recent follow first.
    async fn get_followed(&self, caller_id: &str, page: PageParams) -> Result<Page<UserView>>;
}

/// Postgres-backed [`FeedService`].
#[derive(Clone)]
pub struct PgFeedServer {
    db: ConnectionManager,
    engine: ConsistencyEngine,
    paginator: FeedPaginator,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl PgFeedServer {
    /// Connect to the configured database with real time and UUID ids.
    pub async fn connect(opts: &ConnOptions) -> Result<Self> {
        Ok(Self::new(ConnectionManager::connect(opts).await?))
    }

    pub fn new(db: ConnectionManager) -> Self {
        Self {
            engine: ConsistencyEngine::new(db.clone()),
            db,
            paginator: FeedPaginator::new(),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_paginator(mut self, paginator: FeedPaginator) -> Self {
        self.paginator = paginator;
        self
    }

    pub async fn close(&self) {
        self.db.close().await;
    }

    async fn feed(&self, request: FeedRequest) -> Result<Page<PostView>> {
        self.db
            .run("get_feed", async {
                let mut conn = self.db.acquire(self.db.deadline()).await?;
                let mut source = PgPostSource::new(&mut conn);
                self.paginator.page(&mut source, &request).await
            })
            .await
    }
}

/// Read a post plus its live like aggregate for `caller_id`.
///
/// The aggregate reads follow the primary read on the same connection, so
/// they never observe state older than it.
async fn load_post_view(
    conn: &mut PgConnection,
    caller_id: &str,
    post_id: &str,
) -> Result<Option<PostView>> {
    let Some(post) = PostRepo::new(&mut *conn).get(post_id).await? else {
        return Ok(None);
    };
    let mut likes = LikeRepo::new(conn);
    let like_count = likes.count(post_id).await?;
    let liked_by_caller = likes.exists(post_id, caller_id).await?;

    Ok(Some(PostView {
        post,
        like_count,
        liked_by_caller,
    }))
}

#[async_trait]
impl FeedService for PgFeedServer {
    #[tracing::instrument(skip(self))]
    async fn create_user(&self, user_name: &str, role: &str) -> Result<User> {
        let name = UserName::new(user_name)?;
        let role: Role = role.parse()?;
        let user_id = self.ids.next_id();
        let created_at = self.clock.now_utc();

        let user = self
            .db
            .run("create_user", async {
                let mut conn = self.db.acquire(self.db.deadline()).await?;
                UserRepo::new(&mut conn)
                    .create(&user_id, &name, role, created_at)
                    .await
            })
            .await?;

        tracing::info!(user_id = %user.user_id, "created user");
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    async fn get_user(&self, caller_id: &str, user_id: &str) -> Result<Option<UserView>> {
        require("caller_id", caller_id)?;
        require("user_id", user_id)?;

        self.db
            .run("get_user", async {
                let mut conn = self.db.acquire(self.db.deadline()).await?;
                let Some(user) = UserRepo::new(&mut conn).get(user_id).await? else {
                    return Ok(None);
                };
                let followed_by_caller = if caller_id == user_id {
                    false
                } else {
                    FollowRepo::new(&mut conn).exists(caller_id, user_id).await?
                };
                Ok(Some(UserView {
                    user,
                    followed_by_caller,
                }))
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn follow_user(&self, caller_id: &str, target_id: &str) -> Result<()> {
        require("caller_id", caller_id)?;
        require("target_id", target_id)?;

        let inserted = self
            .engine
            .execute(FollowEdge {
                source_id: caller_id.to_owned(),
                target_id: target_id.to_owned(),
                created_at: self.clock.now_utc(),
            })
            .await?;

        if !inserted {
            tracing::debug!("follow edge already present");
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, content))]
    async fn create_post(&self, caller_id: &str, content: &str) -> Result<PostView> {
        require("caller_id", caller_id)?;
        let content = PostContent::new(content)?;
        let post_id = self.ids.next_id();
        let created_at = self.clock.now_utc();

        let post = self
            .db
            .run("create_post", async {
                let mut conn = self.db.acquire(self.db.deadline()).await?;
                PostRepo::new(&mut conn)
                    .create(&post_id, caller_id, &content, created_at)
                    .await
            })
            .await?;

        tracing::debug!(post_id = %post.post_id, "created post");
        Ok(PostView::unliked(post))
    }

    #[tracing::instrument(skip(self))]
    async fn get_post(&self, caller_id: &str, post_id: &str) -> Result<Option<PostView>> {
        require("caller_id", caller_id)?;
        require("post_id", post_id)?;

        self.db
            .run("get_post", async {
                let mut conn = self.db.acquire(self.db.deadline()).await?;
                load_post_view(&mut conn, caller_id, post_id).await
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn like_post(&self, caller_id: &str, post_id: &str) -> Result<PostView> {
        require("caller_id", caller_id)?;
        require("post_id", post_id)?;

        self.engine
            .execute(LikeEdge {
                post_id: post_id.to_owned(),
                user_id: caller_id.to_owned(),
                created_at: self.clock.now_utc(),
            })
            .await?;

        self.db
            .run("like_post", async {
                let mut conn = self.db.acquire(self.db.deadline()).await?;
                load_post_view(&mut conn, caller_id, post_id)
                    .await?
                    .ok_or_else(|| FeedError::missing("post", post_id))
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_user_feed(
        &self,
        caller_id: &str,
        owner_id: &str,
        page: PageParams,
    ) -> Result<Page<PostView>> {
        require("owner_id", owner_id)?;
        self.feed(FeedRequest {
            caller_id: caller_id.to_owned(),
            owner_id: Some(owner_id.to_owned()),
            limit: page.limit.unwrap_or(DEFAULT_LIMIT),
            cursor: page.cursor,
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_followed_feed(&self, caller_id: &str, page: PageParams) -> Result<Page<PostView>> {
        self.feed(FeedRequest {
            caller_id: caller_id.to_owned(),
            owner_id: None,
            limit: page.limit.unwrap_or(DEFAULT_LIMIT),
            cursor: page.cursor,
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_followed(&self, caller_id: &str, page: PageParams) -> Result<Page<UserView>> {
        require("caller_id", caller_id)?;
        let limit = page.page_limit()?;
        let scope = CursorScope::Following(caller_id.to_owned());
        let after = page
            .cursor
            .as_deref()
            .map(|c| cursor::decode(c, &scope))
            .transpose()?;

        let followed = self
            .db
            .run("get_followed", async {
                let mut conn = self.db.acquire(self.db.deadline()).await?;
                FollowRepo::new(&mut conn)
                    .page_followed(caller_id, after.as_ref(), limit.get() as i64)
                    .await
            })
            .await?;

        let next_cursor = match followed.last() {
            Some(last) if followed.len() == limit.as_usize() => {
                Some(cursor::encode(&scope, &last.feed_key()))
            }
            _ => None,
        };
        let items = followed
            .into_iter()
            .map(|f| UserView {
                user: f.user,
                followed_by_caller: true,
            })
            .collect();

        Ok(Page { items, next_cursor })
    }
}
