//! Error types for Birdstream.
//!
//! Errors carry stable numeric codes and a category so that wrappers can
//! react without parsing messages. Nothing in the detection engine itself
//! fails: insufficient data and degenerate statistics are ordinary outcomes.
//! These errors cover the surfaces around the engine (config, input, I/O).
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 20,
//!   "category": "input",
//!   "message": "malformed observation record: missing field `county`",
//!   "recoverable": true
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::RecordError;

/// Result type alias for Birdstream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors.
    Config,
    /// Malformed observation input.
    Input,
    /// Alert sink failures.
    Sink,
    /// File I/O and serialization errors.
    Io,
    /// Bugs: invariants violated inside the process.
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Sink => write!(f, "sink"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

/// Unified error type for Birdstream.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    // Input errors (20-29)
    #[error("malformed observation record: {0}")]
    Record(#[from] RecordError),

    // Sink errors (30-39)
    #[error("alert sink closed")]
    SinkClosed,

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Internal errors (90-99)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the stable error code for this error.
    ///
    /// - 10-19: Configuration errors
    /// - 20-29: Input errors
    /// - 30-39: Sink errors
    /// - 60-69: I/O errors
    /// - 90-99: Internal errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::Record(_) => 20,
            Error::SinkClosed => 30,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Internal(_) => 90,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Config,
            Error::Record(_) => ErrorCategory::Input,
            Error::SinkClosed => ErrorCategory::Sink,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
            Error::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether processing can continue after this error.
    ///
    /// A malformed record is dropped and the stream goes on; a closed sink
    /// or an internal error stops the run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::Record(_) => true,
            Error::SinkClosed => false,
            Error::Io(_) => true,
            Error::Json(_) => true,
            Error::Internal(_) => false,
        }
    }

    /// Structured form for machine consumers.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "category": self.category(),
            "message": self.to_string(),
            "recoverable": self.is_recoverable(),
        })
    }
}
