use crate::UserId;
use crate::error::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::OffsetDateTime;

crate::identifier!(
    /// Backend-generated folder identifier.
    FolderId
);

/// Minimum folder name length, in characters (after trimming).
pub const MIN_NAME_LENGTH: usize = 3;
/// Maximum folder name length, in characters (after trimming).
pub const MAX_NAME_LENGTH: usize = 50;

/// A user-owned directory node, as stored by the backend.
///
/// `parent_id` is an ownership relation only; the parent may have been
/// deleted concurrently, in which case the tree builder treats the folder as
/// a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub user_id: UserId,
    pub name: FolderName,
    pub parent_id: Option<FolderId>,
    /// Materialized by the backend; never computed client-side.
    pub document_count: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Soft-deleted folders are hidden, never physically removed.
    pub is_deleted: bool,
}
impl Folder {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A validated folder display name.
///
/// Names are trimmed, must be between [`MIN_NAME_LENGTH`] and
/// [`MAX_NAME_LENGTH`] characters, and may only contain ASCII letters and
/// digits, spaces, hyphens, underscores and periods. The same rules apply to
/// creation and rename.
///
/// ```
/// use docshelf_model::FolderName;
///
/// assert!("Tax Returns 2024".parse::<FolderName>().is_ok());
/// assert!("ab".parse::<FolderName>().is_err());
/// assert!("bad/name".parse::<FolderName>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FolderName(String);
impl FolderName {
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            exn::bail!(ErrorKind::InvalidFolderName("Folder name is required"));
        }
        let length = name.chars().count();
        if length < MIN_NAME_LENGTH {
            exn::bail!(ErrorKind::InvalidFolderName("Folder name must be at least 3 characters long"));
        }
        if length > MAX_NAME_LENGTH {
            exn::bail!(ErrorKind::InvalidFolderName("Folder name must be 50 characters or fewer"));
        }
        if !name.chars().all(is_allowed_char) {
            exn::bail!(ErrorKind::InvalidFolderName(
                "Folder name can only contain letters, numbers, spaces, hyphens, underscores, and periods"
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.')
}

impl FromStr for FolderName {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
impl TryFrom<String> for FolderName {
    type Error = Error;
    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}
impl From<FolderName> for String {
    fn from(name: FolderName) -> Self {
        name.0
    }
}
impl AsRef<str> for FolderName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl Display for FolderName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("abc")]
    #[case("Receipts")]
    #[case("Tax Returns 2024")]
    #[case("client-a_v1.2")]
    #[case("  padded  ")]
    #[case("x".repeat(50))]
    fn test_valid_names(#[case] name: String) {
        let parsed = FolderName::new(&name).unwrap();
        assert_eq!(parsed.as_str(), name.trim());
    }

    #[rstest]
    #[case("", "Folder name is required")]
    #[case("   ", "Folder name is required")]
    #[case("ab", "Folder name must be at least 3 characters long")]
    #[case(" ab ", "Folder name must be at least 3 characters long")]
    #[case("x".repeat(51), "Folder name must be 50 characters or fewer")]
    #[case("a/b/c", "Folder name can only contain letters, numbers, spaces, hyphens, underscores, and periods")]
    #[case("naïve", "Folder name can only contain letters, numbers, spaces, hyphens, underscores, and periods")]
    #[case("tab\there", "Folder name can only contain letters, numbers, spaces, hyphens, underscores, and periods")]
    fn test_invalid_names(#[case] name: String, #[case] message: &str) {
        let err = FolderName::new(&name).unwrap_err();
        assert_eq!(err.to_string(), message);
        assert!(matches!(&*err, ErrorKind::InvalidFolderName(_)));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: FolderName = serde_json::from_str("\"Invoices\"").unwrap();
        assert_eq!(ok.as_str(), "Invoices");
        assert!(serde_json::from_str::<FolderName>("\"no\"").is_err());
    }
}
