//! Client-side checks and text extraction for uploads.
//!
//! - [`validate_upload()`] decides whether a file may be uploaded at all:
//!   accepted type, non-empty, within the size limit, and content that
//!   matches its declared type.
//! - [`extract_pdf_text()`] scrapes text out of PDF content streams.
//!
//! Images are handled by the OCR crate instead.

mod consts;
pub mod error;
mod media;
mod pdf;

pub use crate::media::{MAX_UPLOAD_BYTES, MediaType, validate_upload};
pub use crate::pdf::{count_pdf_pages, extract_pdf_text};
