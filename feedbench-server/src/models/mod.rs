//! Domain models with validation at construction
//!
//! All caller input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod pagination;
pub mod post;
pub mod user;
pub mod validation;

pub use pagination::{FeedKey, FeedRequest, Page, PageLimit, PageParams, DEFAULT_LIMIT, MAX_LIMIT};
pub use post::{Post, PostContent, PostView};
pub use user::{Role, User, UserName, UserView};
pub use validation::{require, ValidationError};

pub(crate) use user::UserRow;
