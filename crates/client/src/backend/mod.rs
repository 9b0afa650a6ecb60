//! Backend traits and implementations.
//!
//! The backend-as-a-service is split into four narrow traits by concern.
//! [`Backend`] is blanket-implemented for anything providing all four, so a
//! single [`BackendHandle`] can be passed around the application.

#[cfg(feature = "mock")]
mod mock;
mod rest;

#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::rest::RestBackend;
use crate::auth::{AuthUser, Session, SignUpOutcome};
use crate::error::Result;
use crate::request::{DocumentChanges, DocumentQuery, NewDocument, ProfileChanges};
use async_trait::async_trait;
use docshelf_model::{DashboardData, Document, DocumentId, Folder, FolderId, FolderName, UserProfile};

/// Email and password authentication.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome>;

    /// Revoke the session server-side.
    async fn sign_out(&self, session: &Session) -> Result<()>;

    /// The user a session belongs to. Fails with
    /// [`Unauthorized`](crate::error::ErrorKind::Unauthorized) once the
    /// session is no longer valid.
    async fn current_user(&self, session: &Session) -> Result<AuthUser>;
}

/// The `documents` and `favorites` tables, plus the dashboard procedure.
///
/// Visibility is enforced by the backend: a document that exists but can't be
/// read by the session is indistinguishable from one that doesn't exist.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Without a session, only public documents are visible.
    async fn search_documents(&self, session: Option<&Session>, query: &DocumentQuery) -> Result<Vec<Document>>;

    async fn get_document(&self, session: Option<&Session>, id: DocumentId) -> Result<Document>;

    async fn insert_document(&self, session: &Session, document: &NewDocument) -> Result<Document>;

    async fn update_document(&self, session: &Session, id: DocumentId, changes: &DocumentChanges) -> Result<Document>;

    /// Move documents into a folder (or to the root with `None`). Returns how
    /// many documents were actually moved.
    async fn move_documents(&self, session: &Session, ids: &[DocumentId], folder: Option<FolderId>) -> Result<usize>;

    /// Delete a row, returning it as it was.
    async fn delete_document(&self, session: &Session, id: DocumentId) -> Result<Document>;

    async fn favorite_ids(&self, session: &Session) -> Result<Vec<DocumentId>>;

    /// Fails with [`Conflict`](crate::error::ErrorKind::Conflict) if the
    /// document is already a favourite.
    async fn add_favorite(&self, session: &Session, id: DocumentId) -> Result<()>;

    /// Fails with [`NotFound`](crate::error::ErrorKind::NotFound) if the
    /// document wasn't a favourite.
    async fn remove_favorite(&self, session: &Session, id: DocumentId) -> Result<()>;

    async fn dashboard(&self, session: &Session) -> Result<DashboardData>;
}

/// The `folders` table and its procedures.
#[async_trait]
pub trait FolderStore: Send + Sync {
    /// Flat list of the user's live folders, in no particular order.
    async fn folder_tree(&self, session: &Session) -> Result<Vec<Folder>>;

    /// Fails with [`Conflict`](crate::error::ErrorKind::Conflict) when a live
    /// sibling already has exactly this name. Uniqueness is enforced by the
    /// database index on `(user_id, parent_id, name)`, so names differing
    /// only in case are distinct.
    async fn create_folder(&self, session: &Session, name: &FolderName, parent: Option<FolderId>) -> Result<Folder>;

    /// Same [`Conflict`](crate::error::ErrorKind::Conflict) rule as
    /// [`create_folder()`](Self::create_folder).
    async fn rename_folder(&self, session: &Session, id: FolderId, name: &FolderName) -> Result<Folder>;

    async fn move_folder(&self, session: &Session, id: FolderId, parent: Option<FolderId>) -> Result<Folder>;

    /// Whether the folder is empty: no documents and no live subfolders.
    async fn can_delete_folder(&self, session: &Session, id: FolderId) -> Result<bool>;

    /// Soft delete: the row is flagged, never removed.
    async fn delete_folder(&self, session: &Session, id: FolderId) -> Result<()>;
}

/// The `user_profiles` table.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile(&self, session: &Session) -> Result<UserProfile>;

    async fn update_profile(&self, session: &Session, changes: &ProfileChanges) -> Result<UserProfile>;
}

/// Everything the application needs from the backend-as-a-service.
pub trait Backend: AuthService + DocumentStore + FolderStore + ProfileStore {}
impl<T: AuthService + DocumentStore + FolderStore + ProfileStore> Backend for T {}
