//! Client Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A backend client error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Authentication failed. The message is already fit for users.
    #[display("{_0}")]
    Auth(#[error(not(source))] String),
    /// Missing, expired or revoked session: sign in again.
    #[display("your session has expired, please sign in again")]
    Unauthorized,
    /// Row-level security refused the operation.
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// The row doesn't exist, or isn't visible to this user.
    #[display("{_0} not found")]
    NotFound(#[error(not(source))] String),
    /// A uniqueness or foreign-key constraint rejected the write.
    #[display("conflict: {_0}")]
    Conflict(#[error(not(source))] String),
    /// The backend answered with a row we can't make sense of.
    #[display("invalid response from backend: {_0}")]
    InvalidResponse(#[error(not(source))] &'static str),
    /// Backend URL or key is unusable.
    #[display("invalid backend configuration: {_0}")]
    Configuration(#[error(not(source))] String),
    /// Could not reach the backend.
    #[display("network error")]
    Network,
    /// Backend answered with an unexpected status.
    #[display("backend error ({status}): {message}")]
    BackendError { status: u16, message: String },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network => true,
            Self::BackendError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
