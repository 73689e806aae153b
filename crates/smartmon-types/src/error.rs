//! Error types for data parsing in smartmon-types.

use thiserror::Error;

/// Errors that can occur when parsing values received from the device API.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Unknown operation mode string.
    #[error("Invalid operation mode '{0}': expected AUTO, MANUAL or OFF")]
    InvalidMode(String),

    /// Unknown settings field or metric name.
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    /// Timestamp in a format that is not understood.
    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Result type alias using smartmon-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
