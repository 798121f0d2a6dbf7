//! Post entity and the caller-relative post view

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{FeedKey, ValidationError};

/// Validated, non-empty post body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostContent(String);

impl PostContent {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "content" });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Post record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub post_id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

impl Post {
    /// Position of this post in feed order.
    pub fn feed_key(&self) -> FeedKey {
        FeedKey::new(self.created_at, self.post_id.clone())
    }
}

/// A post as seen by a particular caller.
///
/// `like_count` and `liked_by_caller` are computed from the like edges at
/// read time and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub like_count: i64,
    pub liked_by_caller: bool,
}

impl PostView {
    /// View of a post nobody has liked yet.
    pub fn unliked(post: Post) -> Self {
        Self {
            post,
            like_count: 0,
            liked_by_caller: false,
        }
    }
}
