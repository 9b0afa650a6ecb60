//! Upload pipeline.
//!
//! Each file goes through validation, text extraction, blob upload and row
//! insertion. [`upload()`] handles a single file; [`upload_all()`] runs a
//! batch with bounded concurrency and reports progress as a stream of
//! [`UploadEvent`]s, which an [`UploadTracker`] folds into per-file state.

mod pipeline;
mod progress;

pub use self::pipeline::{Uploaded, upload, upload_all};
pub use self::progress::{UploadEvent, UploadId, UploadProgress, UploadStage, UploadTracker};
use docshelf_model::{FolderId, Tags};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;

/// One file to upload, plus the metadata to store with it.
#[derive(Clone, Default)]
pub struct UploadRequest {
    pub file_name: String,
    pub data: Vec<u8>,
    /// Declared MIME type. Guessed from the file name when absent.
    pub mime_type: Option<String>,
    /// Defaults to the file name without its extension.
    pub title: Option<String>,
    pub tags: Tags,
    pub folder_id: Option<FolderId>,
    pub is_public: bool,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
            ..Default::default()
        }
    }

    /// File name without directories or extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.file_name)
    }

    /// The title to store: the requested one if it isn't blank, otherwise
    /// the file stem.
    pub fn title(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => self.stem().trim().to_string(),
        }
    }
}

impl Debug for UploadRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("UploadRequest")
            .field("file_name", &self.file_name)
            .field("size", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("title", &self.title)
            .field("tags", &self.tags)
            .field("folder_id", &self.folder_id)
            .field("is_public", &self.is_public)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Tax Return.pdf", None, "Tax Return")]
    #[case("scans/receipt.final.png", None, "receipt.final")]
    #[case("notes", None, "notes")]
    #[case("lease.pdf", Some("  "), "lease")]
    #[case("lease.pdf", Some(" Flat lease "), "Flat lease")]
    fn test_title(#[case] file_name: &str, #[case] title: Option<&str>, #[case] expected: &str) {
        let mut request = UploadRequest::new(file_name, b"data".to_vec());
        request.title = title.map(str::to_string);
        assert_eq!(request.title(), expected);
    }

    #[test]
    fn test_debug_omits_bytes() {
        let request = UploadRequest::new("a.pdf", vec![0; 4096]);
        let debug = format!("{request:?}");
        assert!(debug.contains("size: 4096"));
        assert!(debug.len() < 300);
    }
}
