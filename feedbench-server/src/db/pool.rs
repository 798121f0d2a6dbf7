//! Connection management
//!
//! Wraps a bounded sqlx `PgPool`. Each logical operation acquires its own
//! connection or transaction under a deadline; the handle is returned to the
//! pool when dropped, on every exit path.

use std::future::Future;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use crate::config::ConnOptions;
use crate::error::{FeedError, Result};

/// Owner of the pool to the single logical store.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    pool: PgPool,
    deadline: Duration,
}

impl ConnectionManager {
    /// Open a pool against the configured feed database.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store cannot be reached.
    pub async fn connect(opts: &ConnOptions) -> Result<Self> {
        tracing::info!(
            "Connecting to {} (max {} connections)",
            opts.debug_conn_string(&opts.database),
            opts.max_connections
        );
        let pool = PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .acquire_timeout(opts.acquire_timeout())
            .connect_with(opts.connect_options(&opts.database))
            .await?;
        Ok(Self::from_pool(pool, opts.operation_timeout()))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, deadline: Duration) -> Self {
        Self { pool, deadline }
    }

    /// Deadline applied to each logical operation.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Acquire a dedicated connection, failing with `Unavailable` if none
    /// frees up within `deadline`.
    pub async fn acquire(&self, deadline: Duration) -> Result<PoolConnection<Postgres>> {
        within("acquire", deadline, async { Ok(self.pool.acquire().await?) }).await
    }

    /// Begin a transaction on a dedicated connection.
    ///
    /// Dropping the returned transaction without committing rolls it back.
    pub async fn begin(&self, deadline: Duration) -> Result<Transaction<'static, Postgres>> {
        within("begin", deadline, async { Ok(self.pool.begin().await?) }).await
    }

    /// Run one logical operation under this manager's deadline.
    ///
    /// On expiry the operation future is dropped, which releases its
    /// connection and rolls back any open transaction.
    pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        within(operation, self.deadline, fut).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Bound `fut` by `deadline`, reporting expiry as `Unavailable`.
pub async fn within<T, F>(operation: &'static str, deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, ?deadline, "operation deadline exceeded");
            Err(FeedError::DeadlineExceeded {
                operation,
                after: deadline,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_is_unavailable() {
        let result: Result<()> = within("slow", Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.to_string().contains("slow"));
    }

    #[tokio::test]
    async fn fast_operation_passes_through() {
        let value = within("fast", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn inner_error_is_not_rewritten() {
        let result: Result<()> = within("fails", Duration::from_secs(1), async {
            Err(FeedError::missing("post", "p-1"))
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::FailedPrecondition);
    }

    // Integration tests require a real database
    // Run with: FEEDBENCH_DB_HOST=... cargo test -p feedbench-server -- --ignored

    #[tokio::test]
    #[ignore = "requires database"]
    async fn concurrent_pool_access() {
        let mut config = crate::config::FeedbenchConfig::default();
        config
            .apply_env(|key| std::env::var(key).ok())
            .expect("bad env");
        let manager = ConnectionManager::connect(&config.db)
            .await
            .expect("pool creation failed");

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    let mut conn = manager.acquire(manager.deadline()).await.unwrap();
                    let result: (i32,) = sqlx::query_as("SELECT $1::int")
                        .bind(i)
                        .fetch_one(&mut *conn)
                        .await
                        .expect("concurrent query failed");
                    result.0
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.expect("task panicked");
            assert_eq!(result, i as i32);
        }
    }
}
