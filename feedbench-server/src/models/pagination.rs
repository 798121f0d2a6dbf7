//! Keyset pagination types
//!
//! Pages are positioned by the last-seen ordering key, never by offset, so
//! rows inserted ahead of a reader cannot shift what the next page returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Maximum items per page
pub const MAX_LIMIT: u32 = 100;

/// Default items per page
pub const DEFAULT_LIMIT: u32 = 20;

/// Ordering key for newest-first sequences.
///
/// Sequences are sorted by `(created_at DESC, id DESC)`; the id breaks ties
/// between rows written in the same microsecond. The derived `Ord` compares
/// `created_at` first, then `id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedKey {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl FeedKey {
    pub fn new(created_at: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            created_at,
            id: id.into(),
        }
    }

    /// Whether a row with key `self` comes after `cursor` in newest-first order.
    pub fn is_after(&self, cursor: &FeedKey) -> bool {
        self < cursor
    }
}

/// Validated page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimit(u32);

impl PageLimit {
    /// Zero is rejected; anything above [`MAX_LIMIT`] is clamped.
    pub fn new(limit: u32) -> Result<Self, ValidationError> {
        if limit == 0 {
            return Err(ValidationError::TooSmall {
                field: "limit",
                min: 1,
            });
        }
        Ok(Self(limit.min(MAX_LIMIT)))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl Default for PageLimit {
    fn default() -> Self {
        Self(DEFAULT_LIMIT)
    }
}

/// One page of a newest-first sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Resume token; absent once the sequence is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Query parameters for paginated reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

impl PageParams {
    pub fn new(limit: u32, cursor: Option<String>) -> Self {
        Self {
            limit: Some(limit),
            cursor,
        }
    }

    pub fn page_limit(&self) -> Result<PageLimit, ValidationError> {
        match self.limit {
            Some(limit) => PageLimit::new(limit),
            None => Ok(PageLimit::default()),
        }
    }
}

/// Feed read request.
///
/// `owner_id = Some` asks for one user's posts; `None` asks for the merged
/// feed of everyone the caller follows.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub caller_id: String,
    pub owner_id: Option<String>,
    pub limit: u32,
    pub cursor: Option<String>,
}
