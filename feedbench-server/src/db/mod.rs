//! Database layer - connection management, schema and repositories
//!
//! # Design Principles
//!
//! - Bounded connection pool; one connection or transaction per logical operation
//! - Every operation runs under a deadline; expiry is `Unavailable`
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Transactions for multi-step writes (see `engine`)

pub mod pool;
pub mod repos;
pub mod schema;

pub use pool::{within, ConnectionManager};
pub use repos::*;
pub use schema::SchemaManager;
