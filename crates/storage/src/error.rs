//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Object does not exist
    #[display("object not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Access denied (expired session or bucket policy)
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Object already exists and uploads never overwrite
    #[display("object already exists: {_0}")]
    AlreadyExists(#[error(not(source))] String),
    /// Object path contains invalid characters or escapes the bucket
    #[display("invalid object path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// The file's MIME type doesn't belong in any bucket
    #[display("no bucket accepts files of type {_0}")]
    UnsupportedType(#[error(not(source))] String),
    /// Storage service URL or key is unusable
    #[display("invalid storage configuration: {_0}")]
    Configuration(#[error(not(source))] String),
    /// Could not reach the storage service
    #[display("network error")]
    Network,
    /// Storage service answered with an unexpected status
    #[display("storage service error ({status}): {message}")]
    BackendError {
        status: u16,
        message: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network => true,
            Self::BackendError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
