//! Opaque resume tokens for keyset pagination
//!
//! A cursor is URL-safe base64 over a small JSON document holding the
//! last-seen ordering key and the scope (query shape + filter) it was issued
//! for. Presenting a cursor to a different scope is rejected.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::models::{FeedKey, ValidationError};

const CURSOR_VERSION: u8 = 1;

/// The sequence a cursor belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorScope {
    /// Posts by one owner.
    Owner(String),
    /// Posts by everyone the caller follows.
    Followed(String),
    /// Users the caller follows.
    Following(String),
}

impl CursorScope {
    fn tag(&self) -> String {
        match self {
            Self::Owner(id) => format!("owner:{}", id),
            Self::Followed(id) => format!("followed:{}", id),
            Self::Following(id) => format!("following:{}", id),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorToken {
    v: u8,
    scope: String,
    /// `created_at` as microseconds since the epoch.
    ts: i64,
    id: String,
}

/// Encode `key` as a resume token for `scope`.
pub fn encode(scope: &CursorScope, key: &FeedKey) -> String {
    let token = CursorToken {
        v: CURSOR_VERSION,
        scope: scope.tag(),
        ts: key.created_at.timestamp_micros(),
        id: key.id.clone(),
    };
    // Serializing a struct of plain fields cannot fail.
    let json = serde_json::to_vec(&token).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a resume token, checking it was issued for `scope`.
pub fn decode(cursor: &str, scope: &CursorScope) -> Result<FeedKey, ValidationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| invalid("not valid base64"))?;
    let token: CursorToken =
        serde_json::from_slice(&bytes).map_err(|_| invalid("malformed token"))?;

    if token.v != CURSOR_VERSION {
        return Err(invalid(format!("unsupported version {}", token.v)));
    }
    if token.scope != scope.tag() {
        return Err(invalid("cursor was issued for a different feed"));
    }
    let created_at =
        DateTime::from_timestamp_micros(token.ts).ok_or_else(|| invalid("timestamp out of range"))?;

    Ok(FeedKey::new(created_at, token.id))
}

fn invalid(reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidCursor {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn key() -> FeedKey {
        FeedKey::new(Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap(), "p-42")
    }

    #[test]
    fn decodes_what_it_encodes_for_the_same_scope() {
        let scope = CursorScope::Owner("u-1".into());
        let token = encode(&scope, &key());
        assert_eq!(decode(&token, &scope).unwrap(), key());
    }

    #[test]
    fn token_is_url_safe() {
        let token = encode(&CursorScope::Followed("caller/with+odd=chars".into()), &key());
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn rejects_other_owner() {
        let token = encode(&CursorScope::Owner("u-1".into()), &key());
        let err = decode(&token, &CursorScope::Owner("u-2".into())).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCursor { .. }));
    }

    #[test]
    fn rejects_other_query_shape() {
        let token = encode(&CursorScope::Owner("u-1".into()), &key());
        assert!(decode(&token, &CursorScope::Followed("u-1".into())).is_err());
        assert!(decode(&token, &CursorScope::Following("u-1".into())).is_err());
    }

    #[test]
    fn rejects_garbage() {
        let scope = CursorScope::Owner("u-1".into());
        assert!(decode("!!!", &scope).is_err());
        assert!(decode(&URL_SAFE_NO_PAD.encode(b"{\"nope\":1}"), &scope).is_err());
        assert!(decode("", &scope).is_err());
    }

    #[test]
    fn rejects_unknown_version() {
        let scope = CursorScope::Owner("u-1".into());
        let raw = serde_json::json!({"v": 9, "scope": "owner:u-1", "ts": 0, "id": "p"});
        let token = URL_SAFE_NO_PAD.encode(raw.to_string());
        let err = decode(&token, &scope).unwrap_err();
        assert!(err.to_string().contains("unsupported version"));
    }
}
