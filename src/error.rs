//! Shell Error Types

use derive_more::{Display, Error};
use docshelf_config::error::ErrorKind as ConfigErrorKind;
use docshelf_library::error::{Error as LibraryError, ErrorKind as LibraryErrorKind};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("{_0}")]
    Config(ConfigErrorKind),
    #[display("{_0}")]
    Library(LibraryErrorKind),
    #[display("could not read {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// Arguments that parse but don't make sense together.
    #[display("{_0}")]
    Usage(#[error(not(source))] String),
    #[display("could not write output")]
    Output,
}

impl ErrorKind {
    #[track_caller]
    pub fn config(err: docshelf_config::error::Error) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Config(inner))
    }

    #[track_caller]
    pub fn library(err: LibraryError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Library(inner))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Library(kind) => kind.is_retryable(),
            _ => false,
        }
    }
}
