//! User entity, role, and the caller-relative user view

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ValidationError;
use crate::error::FeedError;

/// Account role. Stored as its variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Viewer,
    SmallCreator,
    LargeCreator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "Viewer",
            Self::SmallCreator => "SmallCreator",
            Self::LargeCreator => "LargeCreator",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Viewer, Self::SmallCreator, Self::LargeCreator]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "role" });
        }
        Self::all()
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "role",
                value: s.to_owned(),
            })
    }
}

/// Validated, non-empty user name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserName(String);

impl UserName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "user_name" });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// User record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub user_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// User row as stored; `role` is parsed on the way out.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct UserRow {
    pub user_id: String,
    pub user_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = FeedError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(|_| {
            FeedError::internal(format!(
                "user {} has unknown role '{}'",
                row.user_id, row.role
            ))
        })?;
        Ok(Self {
            user_id: row.user_id,
            user_name: row.user_name,
            role,
            created_at: row.created_at,
        })
    }
}

/// A user as seen by a particular caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    /// Whether the caller follows this user. Always false for the caller's own record.
    pub followed_by_caller: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        for role in Role::all() {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
    }

    #[test]
    fn role_rejects_empty_and_unknown() {
        assert_eq!(
            "".parse::<Role>().unwrap_err(),
            ValidationError::Empty { field: "role" }
        );
        assert!(matches!(
            "viewer".parse::<Role>().unwrap_err(),
            ValidationError::InvalidVariant { .. }
        ));
    }

    #[test]
    fn user_name_rejects_empty() {
        assert!(UserName::new("alice").is_ok());
        assert!(matches!(
            UserName::new("").unwrap_err(),
            ValidationError::Empty { field: "user_name" }
        ));
    }

    #[test]
    fn unknown_stored_role_is_internal() {
        let row = UserRow {
            user_id: "u-1".into(),
            user_name: "alice".into(),
            role: "Admin".into(),
            created_at: Utc::now(),
        };
        let err = User::try_from(row).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }

    #[test]
    fn view_serializes_flat() {
        let view = UserView {
            user: User {
                user_id: "u-1".into(),
                user_name: "alice".into(),
                role: Role::Viewer,
                created_at: Utc::now(),
            },
            followed_by_caller: true,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["user_name"], "alice");
        assert_eq!(json["role"], "Viewer");
        assert_eq!(json["followed_by_caller"], true);
    }
}
