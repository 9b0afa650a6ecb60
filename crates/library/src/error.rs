//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Errors from the lower crates are
//! wrapped with their kind preserved, so callers can still tell a conflict
//! from an expired session without walking the tree.

use derive_more::{Display, Error};
use docshelf_client::error::{Error as BackendError, ErrorKind as BackendErrorKind};
use docshelf_extract::error::{Error as ExtractError, ErrorKind as ExtractErrorKind};
use docshelf_ocr::error::{Error as OcrError, ErrorKind as OcrErrorKind};
use docshelf_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every variant displays as a message fit for users.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The action needs a signed-in user.
    #[display("Please sign in first.")]
    NotSignedIn,
    /// Input was rejected before reaching the backend.
    #[display("{_0}")]
    Invalid(#[error(not(source))] String),
    #[display("{_0}")]
    Backend(BackendErrorKind),
    #[display("{_0}")]
    Storage(StorageErrorKind),
    #[display("{_0}")]
    Extract(ExtractErrorKind),
    #[display("{_0}")]
    Ocr(OcrErrorKind),
    /// The storage path template failed to compile or render.
    #[display("invalid storage path template")]
    Template,
    /// A blocking extraction task panicked or was cancelled.
    #[display("background task failed")]
    Task,
}

impl ErrorKind {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Convert a backend error, keeping its frame as a child in the tree.
    #[track_caller]
    pub fn backend(err: BackendError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Backend(inner))
    }

    #[track_caller]
    pub fn storage(err: StorageError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Storage(inner))
    }

    #[track_caller]
    pub fn extract(err: ExtractError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Extract(inner))
    }

    #[track_caller]
    pub fn ocr(err: OcrError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Ocr(inner))
    }

    /// The session was rejected by the backend; the user must sign in again.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Backend(BackendErrorKind::Unauthorized))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend(kind) => kind.is_retryable(),
            Self::Storage(kind) => kind.is_retryable(),
            _ => false,
        }
    }
}
