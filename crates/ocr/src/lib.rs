//! Optical character recognition for uploaded images.
//!
//! Recognition is delegated to an external `tesseract` executable, invoked as
//! `tesseract <image> stdout -l <language>`. The [`TextRecognizer`] trait is
//! the seam the upload pipeline depends on.

pub mod error;
mod tesseract;

pub use crate::tesseract::Tesseract;
use crate::error::Result;

/// Default recognition language (English).
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Anything that can turn image bytes into text.
///
/// Implementations are blocking; async callers should run them on a blocking
/// thread.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &[u8], language: &str) -> Result<String>;
}

/// Recognizer that answers every image with the same text, or fails.
#[cfg(feature = "mock")]
pub struct MockRecognizer {
    text: Option<String>,
}
#[cfg(feature = "mock")]
impl MockRecognizer {
    pub fn returning(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()) }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}
#[cfg(feature = "mock")]
impl TextRecognizer for MockRecognizer {
    fn recognize(&self, _image: &[u8], _language: &str) -> Result<String> {
        match &self.text {
            Some(text) => Ok(text.clone()),
            None => exn::bail!(error::ErrorKind::EngineFailed {
                code: Some(1),
                stderr: "recognition failure injected".to_string(),
            }),
        }
    }
}
