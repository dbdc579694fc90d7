//! Domain error types.

use thiserror::Error;

/// Value object validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    /// The identifier was empty
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// The identifier exceeded the maximum length
    #[error("{field} must be at most {max} characters (got {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// The identifier contained whitespace or control characters
    #[error("{0} must not contain whitespace or control characters")]
    InvalidCharacter(&'static str),

    /// The identifier could not be parsed
    #[error("{field} is not a valid identifier: {value}")]
    Malformed { field: &'static str, value: String },
}

/// Errors raised while recording a notification
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The payload (or the frame built from it) could not be serialized to JSON
    #[error("failed to serialize notification payload: {0}")]
    Serialization(#[from] serde_json::Error),
}
