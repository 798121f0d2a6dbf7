//! feedbench-server: social graph store over PostgreSQL
//!
//! Users follow users, users publish posts, users like posts. Reads are
//! caller-relative ("do I follow this user", "did I like this post") and
//! feeds are cursor-paginated newest first.
//!
//! # Example
//!
//! ```ignore
//! let opts = ConnOptions::default();
//! SchemaManager::new(opts.clone()).ensure_schema().await?;
//! let server = PgFeedServer::connect(&opts).await?;
//! let alice = server.create_user("alice", "Viewer").await?;
//! ```

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod feed;
pub mod http;
pub mod ids;
pub mod models;
pub mod service;
pub mod state;

pub use clock::{Clock, StubClock, SystemClock};
pub use config::{ConnOptions, FeedbenchConfig, ServerConfig};
pub use db::{ConnectionManager, SchemaManager};
pub use engine::ConsistencyEngine;
pub use error::{ErrorKind, FeedError, Result};
pub use feed::FeedPaginator;
pub use ids::{IdGenerator, UuidGenerator};
pub use service::{FeedService, PgFeedServer};
pub use state::AppState;
