//! Error types for the vantage library.
//!
//! All failures are represented by the [`VantageError`] enum. Errors that can
//! surface on the query path carry a stable wire kind (see
//! [`VantageError::kind`]) so the server can map them onto protocol error
//! responses without string matching.
//!
//! # Examples
//!
//! ```
//! use vantage::error::{Result, VantageError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(VantageError::invalid_argument("k must be > 0"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for vantage operations.
#[derive(Error, Debug)]
pub enum VantageError {
    /// I/O errors (file operations, sockets).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A request or API argument was out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Query vector length does not match the indexed dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the indexed points.
        expected: usize,
        /// Dimensionality actually supplied.
        actual: usize,
    },

    /// Search against an index holding no points.
    #[error("empty index: {0}")]
    EmptyIndex(String),

    /// A query arrived while the server was not in the Running state.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Vector store file errors (bad header, checksum mismatch, truncation).
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected internal failures.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for operations that may fail with VantageError.
pub type Result<T> = std::result::Result<T, VantageError>;

impl VantageError {
    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        VantageError::InvalidArgument(msg.into())
    }

    /// Create a new dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        VantageError::DimensionMismatch { expected, actual }
    }

    /// Create a new empty index error.
    pub fn empty_index<S: Into<String>>(msg: S) -> Self {
        VantageError::EmptyIndex(msg.into())
    }

    /// Create a new service unavailable error.
    pub fn service_unavailable<S: Into<String>>(msg: S) -> Self {
        VantageError::ServiceUnavailable(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        VantageError::Storage(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        VantageError::Internal(msg.into())
    }

    /// Stable error kind string carried on the wire protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            VantageError::Io(_) => "io_failure",
            VantageError::InvalidArgument(_) => "invalid_argument",
            VantageError::DimensionMismatch { .. } => "dimension_mismatch",
            VantageError::EmptyIndex(_) => "empty_index",
            VantageError::ServiceUnavailable(_) => "service_unavailable",
            VantageError::Storage(_) => "io_failure",
            VantageError::Json(_) => "invalid_argument",
            VantageError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = VantageError::invalid_argument("bad k");
        assert_eq!(error.to_string(), "invalid argument: bad k");

        let error = VantageError::dimension_mismatch(128, 64);
        assert_eq!(
            error.to_string(),
            "dimension mismatch: expected 128, got 64"
        );

        let error = VantageError::storage("truncated file");
        assert_eq!(error.to_string(), "storage error: truncated file");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error = VantageError::from(io_error);

        match error {
            VantageError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_wire_kinds() {
        assert_eq!(VantageError::invalid_argument("x").kind(), "invalid_argument");
        assert_eq!(VantageError::dimension_mismatch(2, 3).kind(), "dimension_mismatch");
        assert_eq!(VantageError::empty_index("x").kind(), "empty_index");
        assert_eq!(VantageError::service_unavailable("x").kind(), "service_unavailable");
        assert_eq!(VantageError::storage("x").kind(), "io_failure");
        assert_eq!(VantageError::internal("x").kind(), "internal");
    }
}
