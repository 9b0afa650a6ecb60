//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// Display strings are shown to users as-is.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file is not a PDF or one of the accepted image formats.
    #[display("File type {_0} is not supported. Please upload a PDF or an image (PNG, JPEG, GIF, BMP, TIFF, WebP).")]
    UnsupportedType(#[error(not(source))] String),
    /// The file exceeds the upload size limit.
    #[display("File is too large ({size} bytes). The maximum size is {limit} bytes.")]
    TooLarge { size: u64, limit: u64 },
    /// The file has no content.
    #[display("File is empty.")]
    Empty,
    /// The declared type does not match the file's content.
    #[display("File content does not match its type: expected {declared}, found {detected}.")]
    ContentMismatch {
        declared: &'static str,
        detected: &'static str,
    },
    /// The bytes are not a PDF document at all.
    #[display("not a PDF document")]
    NotPdf,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The bytes are either acceptable or they're not.
        false
    }
}
