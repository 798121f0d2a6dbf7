//! Transactional multi-step writes
//!
//! Every write that touches more than one entity goes through
//! [`ConsistencyEngine::execute`]:
//!
//! ```text
//! Started -> PreconditionsChecked -> EdgeWritten -> Committed
//!    \               \                  \
//!     +---------------+------------------+--> RolledBack
//! ```
//!
//! Precondition reads and the write share one transaction, so an edge can
//! never be written against a user or post that vanished between the check
//! and the insert. A failure after `Started` rolls back before returning; if
//! the rollback fails too, both errors are reported together.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, Transaction};

use crate::db::{ConnectionManager, FollowRepo, LikeRepo, PostRepo, UserRepo};
use crate::error::{FeedError, Result};

/// Progress of a guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Started,
    PreconditionsChecked,
    EdgeWritten,
    Committed,
    RolledBack,
}

/// A write with existence preconditions, applied atomically.
#[async_trait]
pub trait GuardedWrite: Send {
    type Output: Send;

    /// Operation name for logs and deadline errors.
    fn name(&self) -> &'static str;

    /// Verify referenced entities exist. Fails with `FailedPrecondition`.
    async fn check_preconditions(&mut self, conn: &mut PgConnection) -> Result<()>;

    /// Perform the mutation.
    async fn apply(&mut self, conn: &mut PgConnection) -> Result<Self::Output>;
}

/// Runs [`GuardedWrite`]s inside a single transaction.
#[derive(Debug, Clone)]
pub struct ConsistencyEngine {
    db: ConnectionManager,
}

impl ConsistencyEngine {
    pub fn new(db: ConnectionManager) -> Self {
        Self { db }
    }

    /// Open a transaction, check preconditions, write, then commit or roll back.
    ///
    /// The whole sequence is bounded by the connection manager's deadline;
    /// on expiry the transaction is dropped and rolled back by the driver.
    pub async fn execute<W: GuardedWrite>(&self, mut write: W) -> Result<W::Output> {
        let operation = write.name();
        self.db
            .run(operation, async {
                let mut tx = self.db.begin(self.db.deadline()).await?;
                let mut stage = TxStage::Started;
                tracing::debug!(operation, ?stage, "transaction opened");

                let outcome = async {
                    write.check_preconditions(&mut tx).await?;
                    stage = TxStage::PreconditionsChecked;
                    tracing::debug!(operation, ?stage);

                    let output = write.apply(&mut tx).await?;
                    stage = TxStage::EdgeWritten;
                    tracing::debug!(operation, ?stage);
                    Ok::<_, FeedError>(output)
                }
                .await;

                match outcome {
                    Ok(output) => {
                        tx.commit()
                            .await
                            .map_err(|source| FeedError::Commit { operation, source })?;
                        tracing::debug!(operation, stage = ?TxStage::Committed);
                        Ok(output)
                    }
                    Err(err) => Err(rollback(tx, operation, stage, err).await),
                }
            })
            .await
    }
}

/// Roll back after `err`, folding a rollback failure into the returned error.
async fn rollback(
    tx: Transaction<'static, Postgres>,
    operation: &'static str,
    failed_after: TxStage,
    err: FeedError,
) -> FeedError {
    tracing::warn!(
        operation,
        ?failed_after,
        stage = ?TxStage::RolledBack,
        "rolling back: {}",
        err
    );
    match tx.rollback().await {
        Ok(()) => err,
        Err(rollback_err) => {
            tracing::error!(operation, "rollback failed: {}", rollback_err);
            err.with_rollback_failure(rollback_err)
        }
    }
}

/// "source follows target", written only if both users exist.
#[derive(Debug, Clone)]
pub struct FollowEdge {
    pub source_id: String,
    pub target_id: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
impl GuardedWrite for FollowEdge {
    /// Whether a new edge was written (false when it already existed).
    type Output = bool;

    fn name(&self) -> &'static str {
        "follow_user"
    }

    async fn check_preconditions(&mut self, conn: &mut PgConnection) -> Result<()> {
        let mut users = UserRepo::new(conn);
        if !users.exists(&self.source_id).await? {
            return Err(FeedError::missing("source user", self.source_id.as_str()));
        }
        if !users.exists(&self.target_id).await? {
            return Err(FeedError::missing("target user", self.target_id.as_str()));
        }
        Ok(())
    }

    async fn apply(&mut self, conn: &mut PgConnection) -> Result<bool> {
        FollowRepo::new(conn)
            .insert(&self.source_id, &self.target_id, self.created_at)
            .await
    }
}

/// "user likes post", written only if the post exists.
///
/// The liker is trusted as the authenticated caller and not looked up.
#[derive(Debug, Clone)]
pub struct LikeEdge {
    pub post_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
impl GuardedWrite for LikeEdge {
    type Output = bool;

    fn name(&self) -> &'static str {
        "like_post"
    }

    async fn check_preconditions(&mut self, conn: &mut PgConnection) -> Result<()> {
        if !PostRepo::new(conn).exists(&self.post_id).await? {
            return Err(FeedError::missing("post", self.post_id.as_str()));
        }
        Ok(())
    }

    async fn apply(&mut self, conn: &mut PgConnection) -> Result<bool> {
        LikeRepo::new(conn)
            .insert(&self.post_id, &self.user_id, self.created_at)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_named_for_logs() {
        let now = Utc::now();
        let follow = FollowEdge {
            source_id: "a".into(),
            target_id: "b".into(),
            created_at: now,
        };
        let like = LikeEdge {
            post_id: "p".into(),
            user_id: "a".into(),
            created_at: now,
        };
        assert_eq!(follow.name(), "follow_user");
        assert_eq!(like.name(), "like_post");
    }
}
