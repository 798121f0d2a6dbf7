//! Schema management for the feed database
//!
//! All operations are idempotent and run on short-lived direct connections
//! rather than the shared pool. Database-level DDL goes through the
//! maintenance database.

use sqlx::{Connection, Executor, PgConnection};

use crate::config::{ConnOptions, MAINTENANCE_DB};
use crate::db::pool::within;
use crate::error::Result;

// Ids compare bytewise so feed-order ties break the same way as `FeedKey`'s `Ord`.
const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT COLLATE "C" PRIMARY KEY,
            user_name TEXT NOT NULL UNIQUE,
            created_at TIMESTAMPTZ NOT NULL,
            role TEXT NOT NULL
        )
        "#,
    ),
    (
        "follows",
        r#"
        CREATE TABLE IF NOT EXISTS follows (
            source_id TEXT COLLATE "C" NOT NULL,
            target_id TEXT COLLATE "C" NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (source_id, target_id)
        )
        "#,
    ),
    (
        "posts",
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            post_id TEXT COLLATE "C" PRIMARY KEY,
            owner_id TEXT COLLATE "C" NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            content TEXT NOT NULL
        )
        "#,
    ),
    (
        "likes",
        r#"
        CREATE TABLE IF NOT EXISTS likes (
            post_id TEXT COLLATE "C" NOT NULL,
            user_id TEXT COLLATE "C" NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (post_id, user_id)
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS likes_post_id_idx ON likes (post_id)",
    "CREATE INDEX IF NOT EXISTS posts_owner_feed_idx ON posts (owner_id, created_at DESC, post_id DESC)",
    "CREATE INDEX IF NOT EXISTS follows_source_idx ON follows (source_id, created_at DESC, target_id DESC)",
];

/// Creates, drops and clears the feed database.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    options: ConnOptions,
}

impl SchemaManager {
    pub fn new(options: ConnOptions) -> Self {
        Self { options }
    }

    /// Create the database if missing, then its tables and indexes.
    pub async fn ensure_schema(&self) -> Result<()> {
        let db_name = self.options.database.clone();
        let mut admin = self.open(MAINTENANCE_DB).await?;
        let created = self
            .run("ensure_database", async {
                let exists: (bool,) = sqlx::query_as(
                    "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_database WHERE datname = $1)",
                )
                .bind(&db_name)
                .fetch_one(&mut admin)
                .await?;
                if !exists.0 {
                    admin
                        .execute(format!("CREATE DATABASE {}", quote_ident(&db_name)).as_str())
                        .await?;
                }
                Ok(!exists.0)
            })
            .await;
        close(admin).await;
        if created? {
            tracing::info!("Created database {}", db_name);
        }

        let mut conn = self.open(&db_name).await?;
        let result = self
            .run("ensure_tables", async {
                for (table, ddl) in TABLES {
                    tracing::debug!("Ensuring table {}", table);
                    conn.execute(*ddl).await?;
                }
                for ddl in INDEXES {
                    conn.execute(*ddl).await?;
                }
                Ok(())
            })
            .await;
        close(conn).await;
        result?;

        tracing::info!("Schema ready in {}", db_name);
        Ok(())
    }

    /// Drop the database if it exists.
    pub async fn drop_schema(&self) -> Result<()> {
        let db_name = self.options.database.clone();
        let mut admin = self.open(MAINTENANCE_DB).await?;
        let result = self
            .run("drop_database", async {
                admin
                    .execute(format!("DROP DATABASE IF EXISTS {}", quote_ident(&db_name)).as_str())
                    .await?;
                Ok(())
            })
            .await;
        close(admin).await;
        result?;

        tracing::info!("Dropped database {}", db_name);
        Ok(())
    }

    /// Remove every row from every table.
    pub async fn truncate_all(&self) -> Result<()> {
        let mut conn = self.open(&self.options.database).await?;
        let result = self
            .run("truncate_all", async {
                conn.execute("TRUNCATE users, follows, posts, likes").await?;
                Ok(())
            })
            .await;
        close(conn).await;
        result?;

        tracing::info!("Truncated all tables in {}", self.options.database);
        Ok(())
    }

    async fn open(&self, db_name: &str) -> Result<PgConnection> {
        tracing::debug!(
            "Opening connection {}",
            self.options.debug_conn_string(db_name)
        );
        let opts = self.options.connect_options(db_name);
        self.run("connect", async { Ok(PgConnection::connect_with(&opts).await?) })
            .await
    }

    async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        within(operation, self.options.operation_timeout(), fut).await
    }
}

async fn close(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        tracing::warn!("closing connection failed: {}", e);
    }
}

/// Quote a Postgres identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("feeddb"), "\"feeddb\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn every_table_is_created_idempotently() {
        let names: Vec<&str> = TABLES.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["users", "follows", "posts", "likes"]);
        for (_, ddl) in TABLES {
            assert!(ddl.contains("IF NOT EXISTS"));
        }
        for ddl in INDEXES {
            assert!(ddl.contains("IF NOT EXISTS"));
        }
    }
}
