use docshelf_model::{DocumentId, FileKind, FolderId, Tags, UserId};
use serde::Serialize;
use std::str::FromStr;

/// Which folder a search is restricted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FolderFilter {
    #[default]
    Any,
    /// Documents not in any folder.
    Unfiled,
    In(FolderId),
}

/// Whose documents a search covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    /// Everything the session may read: own documents plus public ones.
    #[default]
    Accessible,
    Own(UserId),
    Public,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Title,
}
impl FromStr for SortOrder {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" | "new" => Ok(SortOrder::Newest),
            "oldest" | "old" => Ok(SortOrder::Oldest),
            "title" | "name" => Ok(SortOrder::Title),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Document search criteria. Every criterion narrows the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    /// Full-text query over extracted content; titles match by substring.
    pub text: Option<String>,
    pub file_type: Option<FileKind>,
    pub folder: FolderFilter,
    pub tag: Option<String>,
    /// Restrict to these ids (used for favourites-only searches).
    pub ids: Option<Vec<DocumentId>>,
    pub scope: Scope,
    pub sort: SortOrder,
    pub limit: Option<usize>,
}
impl DocumentQuery {
    /// The text query, trimmed, if there's anything left of it.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|text| !text.is_empty())
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref().map(str::trim).filter(|tag| !tag.is_empty())
    }
}

/// A document row to insert after its blob has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewDocument {
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub file_type: FileKind,
    pub mime_type: String,
    pub file_size: u64,
    pub file_url: String,
    pub storage_path: String,
    pub is_public: bool,
    pub tags: Tags,
    pub folder_id: Option<FolderId>,
}

/// Partial update of a document. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    /// `Some(None)` moves the document out of its folder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<Option<FolderId>>,
}
impl DocumentChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.tags.is_none() && self.is_public.is_none() && self.folder_id.is_none()
    }
}

/// Partial update of the signed-in user's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<docshelf_model::Theme>,
}
