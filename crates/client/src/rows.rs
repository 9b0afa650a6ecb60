//! Wire shapes of backend responses.
//!
//! Each query deserializes into an explicit row type, which is then converted
//! into a domain type. Conversion is strict: a row that doesn't fit the
//! domain is an [`InvalidResponse`](ErrorKind::InvalidResponse), never
//! silently patched up.

use crate::auth::{AuthUser, Session};
use crate::error::{Error, ErrorKind, Result};
use docshelf_model::{
    AccessToken, DashboardData, Document, FileKind, Folder, FolderName, Role, Tags, Theme, UserProfile,
};
use exn::{OptionExt, ResultExt};
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Column selection for document queries: every column plus the folder name.
pub(crate) const DOCUMENT_COLUMNS: &str = "*,folders(name)";

fn timestamp(value: &str, field: &'static str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).or_raise(|| ErrorKind::InvalidResponse(field))
}

fn unsigned(value: Option<i64>, field: &'static str) -> Result<u64> {
    u64::try_from(value.unwrap_or_default()).or_raise(|| ErrorKind::InvalidResponse(field))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: Option<String>,
}
impl From<UserRow> for AuthUser {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.into(),
            email: row.email.unwrap_or_default(),
        }
    }
}

/// Response of the password grant, and of sign-up when the project
/// auto-confirms accounts.
#[derive(Debug, Deserialize)]
pub(crate) struct SessionRow {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Seconds since the Unix epoch.
    pub expires_at: Option<i64>,
    /// Seconds from now.
    pub expires_in: Option<i64>,
    pub user: UserRow,
}
impl TryFrom<SessionRow> for Session {
    type Error = Error;
    fn try_from(row: SessionRow) -> Result<Self> {
        let expires_at = match (row.expires_at, row.expires_in) {
            (Some(at), _) => {
                Some(OffsetDateTime::from_unix_timestamp(at).or_raise(|| ErrorKind::InvalidResponse("expires_at"))?)
            },
            (None, Some(seconds)) => Some(OffsetDateTime::now_utc() + time::Duration::seconds(seconds)),
            (None, None) => None,
        };
        if row.access_token.is_empty() {
            exn::bail!(ErrorKind::InvalidResponse("access_token"));
        }
        Ok(Self {
            user: row.user.into(),
            access_token: AccessToken::new(row.access_token),
            refresh_token: row.refresh_token,
            expires_at,
        })
    }
}

/// Sign-up answers either with a session, or with the bare user when email
/// confirmation is pending.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SignUpRow {
    Session(SessionRow),
    User(UserRow),
}

/// Error body of the auth service. Which field is populated depends on the
/// endpoint and the service version.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuthErrorRow {
    pub error_description: Option<String>,
    pub msg: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}
impl AuthErrorRow {
    pub fn into_message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message).or(self.error)
    }
}

/// Error body of the rows API.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RestErrorRow {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FolderNameRow {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub file_type: String,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub file_url: String,
    pub storage_path: Option<String>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub folder_id: Option<Uuid>,
    pub created_at: String,
    /// Embedded join, present when selected with [`DOCUMENT_COLUMNS`].
    pub folders: Option<FolderNameRow>,
}
impl TryFrom<DocumentRow> for Document {
    type Error = Error;
    fn try_from(row: DocumentRow) -> Result<Self> {
        let file_type = row.file_type.parse::<FileKind>().or_raise(|| ErrorKind::InvalidResponse("file_type"))?;
        Ok(Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            title: row.title,
            content: row.content.unwrap_or_default(),
            file_type,
            mime_type: row.mime_type,
            file_size: unsigned(row.file_size, "file_size")?,
            file_url: row.file_url,
            storage_path: row.storage_path,
            is_public: row.is_public.unwrap_or(false),
            tags: row.tags.map(Tags::from).unwrap_or_default(),
            folder_id: row.folder_id.map(Into::into),
            folder_name: row.folders.map(|folder| folder.name),
            created_at: timestamp(&row.created_at, "created_at")?,
            is_favorite: false,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FolderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub document_count: Option<i64>,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub is_deleted: Option<bool>,
}
impl TryFrom<FolderRow> for Folder {
    type Error = Error;
    fn try_from(row: FolderRow) -> Result<Self> {
        let created_at = timestamp(&row.created_at, "created_at")?;
        Ok(Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            name: FolderName::new(&row.name).or_raise(|| ErrorKind::InvalidResponse("name"))?,
            parent_id: row.parent_id.map(Into::into),
            document_count: unsigned(row.document_count, "document_count")?,
            created_at,
            updated_at: row
                .updated_at
                .as_deref()
                .map(|value| timestamp(value, "updated_at"))
                .transpose()?
                .unwrap_or(created_at),
            is_deleted: row.is_deleted.unwrap_or(false),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FavoriteRow {
    pub document_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileRow {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub theme: Option<String>,
    pub created_at: String,
}
impl TryFrom<ProfileRow> for UserProfile {
    type Error = Error;
    fn try_from(row: ProfileRow) -> Result<Self> {
        Ok(Self {
            id: row.id.into(),
            email: row.email,
            display_name: row.display_name,
            role: row
                .role
                .map(|role| role.parse::<Role>())
                .transpose()
                .or_raise(|| ErrorKind::InvalidResponse("role"))?
                .unwrap_or_default(),
            theme: row
                .theme
                .map(|theme| theme.parse::<Theme>())
                .transpose()
                .or_raise(|| ErrorKind::InvalidResponse("theme"))?
                .unwrap_or_default(),
            created_at: timestamp(&row.created_at, "created_at")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DashboardRow {
    #[serde(default)]
    pub total_documents: Option<i64>,
    #[serde(default)]
    pub pdf_count: Option<i64>,
    #[serde(default)]
    pub image_count: Option<i64>,
    #[serde(default, alias = "total_size")]
    pub total_bytes: Option<i64>,
    #[serde(default)]
    pub favorite_count: Option<i64>,
    #[serde(default)]
    pub folder_count: Option<i64>,
    #[serde(default)]
    pub recent_documents: Option<Vec<DocumentRow>>,
}
impl TryFrom<DashboardRow> for DashboardData {
    type Error = Error;
    fn try_from(row: DashboardRow) -> Result<Self> {
        Ok(Self {
            total_documents: unsigned(row.total_documents, "total_documents")?,
            pdf_count: unsigned(row.pdf_count, "pdf_count")?,
            image_count: unsigned(row.image_count, "image_count")?,
            total_bytes: unsigned(row.total_bytes, "total_bytes")?,
            favorite_count: unsigned(row.favorite_count, "favorite_count")?,
            folder_count: unsigned(row.folder_count, "folder_count")?,
            recent_documents: row
                .recent_documents
                .unwrap_or_default()
                .into_iter()
                .map(Document::try_from)
                .collect::<Result<_>>()?,
        })
    }
}

/// Take the single row of a filtered-by-id response.
pub(crate) fn single<T>(rows: Vec<T>, what: &str) -> Result<T> {
    rows.into_iter().next().ok_or_raise(|| ErrorKind::NotFound(what.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document_json() -> serde_json::Value {
        json!({
            "id": "6c0f1c43-5d4e-4d1c-9c1e-2b3f1c6a9f10",
            "user_id": "0b7a4b9e-1d33-4b8a-8f0e-52c9e8b1a7d2",
            "title": "Lease",
            "content": "Tenant agrees",
            "file_type": "pdf",
            "mime_type": "application/pdf",
            "file_size": 2048,
            "file_url": "https://x/storage/v1/object/public/pdf-documents/a.pdf",
            "storage_path": "a.pdf",
            "is_public": null,
            "tags": ["home", "legal"],
            "folder_id": null,
            "created_at": "2024-03-01T10:15:00.123456+00:00",
            "folders": null
        })
    }

    #[test]
    fn test_document_row() {
        let row: DocumentRow = serde_json::from_value(document_json()).unwrap();
        let document = Document::try_from(row).unwrap();
        assert_eq!(document.file_type, FileKind::Pdf);
        assert_eq!(document.file_size, 2048);
        assert!(!document.is_public);
        assert_eq!(document.tags.to_string(), "home, legal");
        assert_eq!(document.created_at.year(), 2024);
        assert_eq!(document.folder_name, None);
    }

    #[test]
    fn test_document_row_with_folder_join() {
        let mut value = document_json();
        value["folder_id"] = json!("1e2d3c4b-5a69-4788-9a0b-1c2d3e4f5a6b");
        value["folders"] = json!({ "name": "Housing" });
        let document = Document::try_from(serde_json::from_value::<DocumentRow>(value).unwrap()).unwrap();
        assert_eq!(document.folder_name.as_deref(), Some("Housing"));
        assert!(document.folder_id.is_some());
    }

    #[test]
    fn test_malformed_document_rows() {
        let mut value = document_json();
        value["file_type"] = json!("spreadsheet");
        value["mime_type"] = json!(null);
        let err = Document::try_from(serde_json::from_value::<DocumentRow>(value).unwrap()).unwrap_err();
        assert_eq!(&*err, &ErrorKind::InvalidResponse("file_type"));

        let mut value = document_json();
        value["file_size"] = json!(-1);
        let err = Document::try_from(serde_json::from_value::<DocumentRow>(value).unwrap()).unwrap_err();
        assert_eq!(&*err, &ErrorKind::InvalidResponse("file_size"));

        let mut value = document_json();
        value["created_at"] = json!("yesterday");
        let err = Document::try_from(serde_json::from_value::<DocumentRow>(value).unwrap()).unwrap_err();
        assert_eq!(&*err, &ErrorKind::InvalidResponse("created_at"));
    }

    #[test]
    fn test_folder_row_validates_name() {
        let value = json!({
            "id": "1e2d3c4b-5a69-4788-9a0b-1c2d3e4f5a6b",
            "user_id": "0b7a4b9e-1d33-4b8a-8f0e-52c9e8b1a7d2",
            "name": "x",
            "parent_id": null,
            "document_count": 3,
            "created_at": "2024-03-01T10:15:00Z",
            "updated_at": null,
            "is_deleted": false
        });
        let err = Folder::try_from(serde_json::from_value::<FolderRow>(value).unwrap()).unwrap_err();
        assert_eq!(&*err, &ErrorKind::InvalidResponse("name"));
    }

    #[test]
    fn test_sign_up_shapes() {
        let pending: SignUpRow = serde_json::from_value(json!({
            "id": "0b7a4b9e-1d33-4b8a-8f0e-52c9e8b1a7d2",
            "email": "new@example.com",
            "confirmation_sent_at": "2024-03-01T10:15:00Z"
        }))
        .unwrap();
        assert!(matches!(pending, SignUpRow::User(_)));
        let active: SignUpRow = serde_json::from_value(json!({
            "access_token": "jwt",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": "0b7a4b9e-1d33-4b8a-8f0e-52c9e8b1a7d2", "email": "new@example.com" }
        }))
        .unwrap();
        let SignUpRow::Session(row) = active else {
            panic!("expected a session");
        };
        let session = Session::try_from(row).unwrap();
        assert_eq!(session.access_token.expose(), "jwt");
        assert!(session.expires_at.is_some());
    }

    #[test]
    fn test_profile_row_defaults() {
        let row: ProfileRow = serde_json::from_value(json!({
            "id": "0b7a4b9e-1d33-4b8a-8f0e-52c9e8b1a7d2",
            "email": "ada@example.com",
            "display_name": null,
            "role": "admin",
            "theme": null,
            "created_at": "2024-03-01T10:15:00Z"
        }))
        .unwrap();
        let profile = UserProfile::try_from(row).unwrap();
        assert_eq!(profile.role, Role::Admin);
        assert_eq!(profile.theme, Theme::System);
    }
}
