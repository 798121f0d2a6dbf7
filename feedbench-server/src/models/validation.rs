//! Validation error types

use std::fmt;

/// Validation error for request fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Numeric field below its minimum
    TooSmall { field: &'static str, min: u32 },

    /// Cursor could not be decoded or belongs to another query
    InvalidCursor { reason: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::TooSmall { field, min } => write!(f, "{} must be at least {}", field, min),
            Self::InvalidCursor { reason } => write!(f, "invalid cursor: {}", reason),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Reject an empty required field, returning it untouched otherwise.
pub fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    if value.is_empty() {
        Err(ValidationError::Empty { field })
    } else {
        Ok(value)
    }
}
