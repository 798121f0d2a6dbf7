//! Repository implementations for database access
//!
//! Each repository borrows one connection or transaction, so a logical
//! operation decides its own transactional scope:
//! - Handles edge conflicts via ON CONFLICT (no check-then-insert)
//! - Keyset pagination on `(created_at DESC, id DESC)`
//! - Batch aggregates with `= ANY($1)` (no N+1)

pub mod follows;
pub mod likes;
pub mod posts;
pub mod users;

pub use follows::{FollowRepo, Followed};
pub use likes::{LikeRepo, LikeStats};
pub use posts::PostRepo;
pub use users::UserRepo;
