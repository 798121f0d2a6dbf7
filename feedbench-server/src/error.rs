//! Error types for feedbench-server
//!
//! Every failure carries an [`ErrorKind`] so callers can tell a caller bug
//! (`InvalidArgument`) from a retryable outage (`Unavailable`) without
//! matching on driver details. Single-entity lookups model "not found" as
//! `Option::None`, never as an error.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::models::ValidationError;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

pub type Result<T> = std::result::Result<T, FeedError>;

/// Coarse failure classes exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed input. Never retried.
    InvalidArgument,
    /// Uniqueness violation on a non-idempotent field.
    AlreadyExists,
    /// A referenced entity is missing during a multi-step write.
    FailedPrecondition,
    /// Connectivity failure or deadline expiry. Safe to retry with backoff.
    Unavailable,
    /// Unexpected store failure.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::AlreadyExists => "already_exists",
            Self::FailedPrecondition => "failed_precondition",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),

    #[error("{resource} already exists: '{key}'")]
    AlreadyExists { resource: &'static str, key: String },

    #[error("{side} does not exist, id=\"{id}\"")]
    MissingReference { side: &'static str, id: String },

    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("{operation} exceeded its deadline of {after:?}")]
    DeadlineExceeded {
        operation: &'static str,
        after: Duration,
    },

    #[error("store error: {0}")]
    Store(#[source] sqlx::Error),

    #[error("committing {operation} failed: {source}")]
    Commit {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{cause}; rollback also failed: {rollback}")]
    RollbackFailed {
        cause: Box<FeedError>,
        #[source]
        rollback: sqlx::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::MissingReference { .. } => ErrorKind::FailedPrecondition,
            Self::Unavailable(_) | Self::DeadlineExceeded { .. } => ErrorKind::Unavailable,
            Self::Store(_)
            | Self::Commit { .. }
            | Self::RollbackFailed { .. }
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn missing(side: &'static str, id: impl Into<String>) -> Self {
        Self::MissingReference {
            side,
            id: id.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Combine a failure with the error raised while rolling back after it.
    pub fn with_rollback_failure(self, rollback: sqlx::Error) -> Self {
        Self::RollbackFailed {
            cause: Box::new(self),
            rollback,
        }
    }

    /// Map a driver error, turning a unique violation into `AlreadyExists`
    /// for the given resource.
    pub fn unique(resource: &'static str, key: &str, err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            Self::AlreadyExists {
                resource,
                key: key.to_owned(),
            }
        } else {
            err.into()
        }
    }
}

impl From<sqlx::Error> for FeedError {
    fn from(err: sqlx::Error) -> Self {
        if is_connectivity(&err) {
            return Self::Unavailable(err);
        }
        if is_unique_violation(&err) {
            let key = match &err {
                sqlx::Error::Database(db) => db.constraint().unwrap_or("unknown").to_owned(),
                _ => "unknown".to_owned(),
            };
            return Self::AlreadyExists { resource: "row", key };
        }
        Self::Store(err)
    }
}

/// Errors that mean the store could not be reached or the pool is exhausted.
pub fn is_connectivity(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed
    )
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_errors_are_unavailable() {
        let err: FeedError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: FeedError = sqlx::Error::Io(io).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn other_driver_errors_are_internal() {
        let err: FeedError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("store error"));
    }

    #[test]
    fn unique_helper_passes_through_non_violations() {
        let err = FeedError::unique("user name", "alice", sqlx::Error::PoolClosed);
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn missing_reference_names_the_side() {
        let err = FeedError::missing("target user", "u-2");
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        assert_eq!(err.to_string(), "target user does not exist, id=\"u-2\"");
    }

    #[test]
    fn rollback_failure_keeps_both_errors() {
        let original = FeedError::missing("source user", "u-1");
        let combined = original.with_rollback_failure(sqlx::Error::PoolClosed);

        assert_eq!(combined.kind(), ErrorKind::Internal);
        let msg = combined.to_string();
        assert!(msg.contains("source user does not exist"));
        assert!(msg.contains("rollback also failed"));
    }

    #[test]
    fn deadline_is_unavailable() {
        let err = FeedError::DeadlineExceeded {
            operation: "get_user",
            after: Duration::from_secs(10),
        };
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn validation_is_invalid_argument() {
        let err: FeedError = ValidationError::Empty { field: "user_name" }.into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.to_string(), "invalid argument: user_name cannot be empty");
    }
}
