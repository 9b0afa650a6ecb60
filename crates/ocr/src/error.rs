//! OCR Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An OCR error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for OCR operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("tesseract not detected on your system")]
    EngineNotFound,
    /// Language codes look like `eng` or `eng+deu`.
    #[display("invalid OCR language: {_0}")]
    InvalidLanguage(#[error(not(source))] String),
    /// The engine exited unsuccessfully. No exit code means it was killed by
    /// a signal.
    #[display("tesseract failed ({}): {stderr}", code.map_or_else(|| "signal".to_string(), |code| code.to_string()))]
    EngineFailed {
        code: Option<i32>,
        stderr: String,
    },
    /// Writing the image to a temporary file or spawning the engine failed.
    #[display("could not run the OCR engine")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
