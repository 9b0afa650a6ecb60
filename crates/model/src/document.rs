use crate::error::{Error, ErrorKind, Result};
use crate::{FolderId, Tags, UserId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::OffsetDateTime;

crate::identifier!(
    /// Backend-generated document identifier.
    DocumentId
);

/// Category of an uploaded file. Decides the storage bucket and the text
/// extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Image,
}
impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Image => "image",
        }
    }

    /// Category for a MIME type, or `None` if the type isn't a PDF or image.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        if mime == "application/pdf" {
            Some(FileKind::Pdf)
        } else if mime.starts_with("image/") {
            Some(FileKind::Image)
        } else {
            None
        }
    }
}
impl FromStr for FileKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => FileKind::Pdf,
            "image" | "img" => FileKind::Image,
            _ => exn::bail!(ErrorKind::ParseError { field: "file_type", value: s.to_string() }),
        })
    }
}
impl Display for FileKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Access level embedded in a share link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    View,
    Edit,
    Comment,
}
impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::View => "view",
            AccessLevel::Edit => "edit",
            AccessLevel::Comment => "comment",
        }
    }
}
impl FromStr for AccessLevel {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "view" => AccessLevel::View,
            "edit" => AccessLevel::Edit,
            "comment" => AccessLevel::Comment,
            _ => exn::bail!(ErrorKind::ParseError { field: "access", value: s.to_string() }),
        })
    }
}
impl Display for AccessLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// An uploaded file's metadata and extracted content.
///
/// The schema belongs to the backend; this is the shape the client consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub user_id: UserId,
    pub title: String,
    /// Raw text extracted client-side at upload time (possibly empty).
    pub content: String,
    pub file_type: FileKind,
    pub mime_type: Option<String>,
    /// Size of the stored blob, in bytes.
    pub file_size: u64,
    /// Public URL of the stored blob.
    pub file_url: String,
    /// Object path inside the bucket, when the backend recorded one.
    pub storage_path: Option<String>,
    pub is_public: bool,
    pub tags: Tags,
    pub folder_id: Option<FolderId>,
    /// Joined from `folders` when the query asked for it.
    pub folder_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Filled by the document service from the user's favorites; never stored
    /// on the row itself.
    #[serde(default)]
    pub is_favorite: bool,
}
impl Document {
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.user_id == user
    }

    /// A short single-line preview of the extracted text.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let collapsed = self.content.split_whitespace().collect::<Vec<_>>().join(" ");
        match collapsed.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}…", collapsed[..cut].trim_end()),
            None => collapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("application/pdf", Some(FileKind::Pdf))]
    #[case("APPLICATION/PDF", Some(FileKind::Pdf))]
    #[case("image/png", Some(FileKind::Image))]
    #[case("image/webp", Some(FileKind::Image))]
    #[case("text/plain", None)]
    #[case("", None)]
    fn test_kind_from_mime(#[case] mime: &str, #[case] expected: Option<FileKind>) {
        assert_eq!(FileKind::from_mime(mime), expected);
    }

    #[rstest]
    #[case("view", AccessLevel::View)]
    #[case("Edit", AccessLevel::Edit)]
    #[case(" comment ", AccessLevel::Comment)]
    fn test_access_level_parse(#[case] input: &str, #[case] expected: AccessLevel) {
        assert_eq!(input.parse::<AccessLevel>().unwrap(), expected);
        assert_eq!(expected.as_str().parse::<AccessLevel>().unwrap(), expected);
    }

    #[test]
    fn test_access_level_invalid() {
        let err = "admin".parse::<AccessLevel>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParseError { field: "access", .. }));
    }

    #[test]
    fn test_excerpt() {
        let document = Document {
            id: uuid::Uuid::nil().into(),
            user_id: uuid::Uuid::nil().into(),
            title: "Invoice".to_string(),
            content: "Total   due:\n\n 42.00   EUR".to_string(),
            file_type: FileKind::Pdf,
            mime_type: Some("application/pdf".to_string()),
            file_size: 10,
            file_url: String::new(),
            storage_path: None,
            is_public: false,
            tags: Tags::default(),
            folder_id: None,
            folder_name: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            is_favorite: false,
        };
        assert_eq!(document.excerpt(100), "Total due: 42.00 EUR");
        assert_eq!(document.excerpt(9), "Total due…");
    }
}
