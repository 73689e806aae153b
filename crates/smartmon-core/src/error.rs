//! Error types for smartmon-core.
//!
//! Every failure the engine can observe falls into one of a few kinds,
//! exposed through [`Error::kind`]:
//!
//! | Error | Kind | Typical cause |
//! |-------|------|---------------|
//! | [`Error::Transport`] | Transport | Connection refused, DNS failure, timeout |
//! | [`Error::Status`] | Transport | Device answered with a non-2xx status |
//! | [`Error::Unavailable`] | Transport | Injected outage (mock) |
//! | [`Error::Decode`] | Decode | Body is not the expected JSON shape |
//! | [`Error::InvalidResponse`] | Decode | Injected malformed payload (mock) |
//! | [`Error::InvalidValue`] | InvalidValue | Non-finite threshold rejected locally |
//! | [`Error::InvalidUrl`], [`Error::InvalidConfig`] | Config | Bad construction parameters |
//!
//! Inside the sync engine none of these are retried: a failed poll is
//! superseded by the next tick and a failed mutation is reported once.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use smartmon_types::ThresholdField;

/// Errors that can occur when talking to the device API.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request could not be sent or the response could not be read.
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The device answered with a non-success status.
    #[error("{url} returned HTTP {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// The device could not be reached.
    #[error("Device unavailable at {url}: {message}")]
    Unavailable { url: String, message: String },

    /// The response body did not match the expected shape.
    #[error("Malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response body was rejected for a reason other than JSON syntax.
    #[error("Malformed response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    /// A threshold value was rejected before anything was sent.
    #[error("Invalid value {value} for {field}")]
    InvalidValue { field: ThresholdField, value: f64 },

    /// Invalid base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid runtime configuration (e.g. a zero poll interval).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// Network unreachable, timeout, or non-2xx status.
    Transport,
    /// Malformed JSON or shape mismatch.
    Decode,
    /// Locally rejected input.
    InvalidValue,
    /// Construction or configuration error.
    Config,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport { .. } | Error::Status { .. } | Error::Unavailable { .. } => {
                ErrorKind::Transport
            }
            Error::Decode { .. } | Error::InvalidResponse { .. } => ErrorKind::Decode,
            Error::InvalidValue { .. } => ErrorKind::InvalidValue,
            Error::InvalidUrl(_) | Error::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Create an [`Error::Unavailable`].
    pub fn unavailable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Unavailable {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an [`Error::InvalidResponse`].
    pub fn invalid_response(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidResponse {
            url: url.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Decode => write!(f, "decode"),
            ErrorKind::InvalidValue => write!(f, "invalid value"),
            ErrorKind::Config => write!(f, "config"),
        }
    }
}

/// Result type alias using smartmon-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
