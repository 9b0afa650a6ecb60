//! In-memory backend for testing.

use crate::auth::{AuthUser, Session, SignUpOutcome, auth_message};
use crate::backend::{AuthService, DocumentStore, FolderStore, ProfileStore};
use crate::error::{ErrorKind, Result};
use crate::request::{
    DocumentChanges, DocumentQuery, FolderFilter, NewDocument, ProfileChanges, Scope, SortOrder,
};
use async_trait::async_trait;
use docshelf_model::{
    AccessToken, DashboardData, Document, DocumentId, FileKind, Folder, FolderId, FolderName, Role, Theme, UserId,
    UserProfile,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

const MIN_PASSWORD_LENGTH: usize = 6;
const SESSION_LIFETIME: Duration = Duration::hours(1);
const RECENT_DOCUMENTS: usize = 5;

struct Account {
    id: UserId,
    email: String,
    password: String,
    confirmed: bool,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    tokens: HashMap<String, UserId>,
    /// Insertion order.
    documents: Vec<Document>,
    folders: Vec<Folder>,
    favorites: HashSet<(UserId, DocumentId)>,
    profiles: HashMap<UserId, UserProfile>,
    clock: Option<OffsetDateTime>,
}

impl State {
    /// Strictly increasing timestamps, so creation order is observable.
    fn tick(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let next = match self.clock {
            Some(last) if last >= now => last + Duration::microseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next
    }

    fn authorize(&self, session: &Session) -> Result<UserId> {
        match self.tokens.get(session.access_token.expose()) {
            Some(user) => Ok(*user),
            None => exn::bail!(ErrorKind::Unauthorized),
        }
    }

    fn viewer(&self, session: Option<&Session>) -> Result<Option<UserId>> {
        session.map(|session| self.authorize(session)).transpose()
    }

    fn live_folder(&self, user: UserId, id: FolderId) -> Option<&Folder> {
        self.folders
            .iter()
            .find(|folder| folder.id == id && folder.user_id == user && !folder.is_deleted)
    }

    /// Foreign key check for a document or folder parent reference.
    fn check_parent(&self, user: UserId, parent: Option<FolderId>) -> Result<()> {
        match parent {
            Some(id) if self.live_folder(user, id).is_none() => {
                exn::bail!(ErrorKind::Conflict(format!("folder {id} does not exist")))
            },
            _ => Ok(()),
        }
    }

    fn check_sibling_name(&self, user: UserId, parent: Option<FolderId>, name: &FolderName, except: Option<FolderId>) -> Result<()> {
        let taken = self.folders.iter().any(|folder| {
            folder.user_id == user
                && !folder.is_deleted
                && folder.parent_id == parent
                && Some(folder.id) != except
                && folder.name == *name
        });
        if taken {
            exn::bail!(ErrorKind::Conflict(format!("a folder named '{name}' already exists here")));
        }
        Ok(())
    }

    /// A document as the rows API returns it: folder name joined, document
    /// counts materialized.
    fn present(&self, document: &Document) -> Document {
        let mut document = document.clone();
        document.folder_name = document
            .folder_id
            .and_then(|id| self.folders.iter().find(|folder| folder.id == id))
            .map(|folder| folder.name.to_string());
        document
    }

    fn present_folder(&self, folder: &Folder) -> Folder {
        let mut folder = folder.clone();
        folder.document_count = self
            .documents
            .iter()
            .filter(|document| document.folder_id == Some(folder.id))
            .count() as u64;
        folder
    }

    fn owned_document_mut(&mut self, user: UserId, id: DocumentId) -> Result<&mut Document> {
        match self.documents.iter_mut().find(|document| document.id == id && document.user_id == user) {
            Some(document) => Ok(document),
            None => exn::bail!(ErrorKind::NotFound("document".to_string())),
        }
    }

    fn owned_folder_mut(&mut self, user: UserId, id: FolderId) -> Result<&mut Folder> {
        match self
            .folders
            .iter_mut()
            .find(|folder| folder.id == id && folder.user_id == user && !folder.is_deleted)
        {
            Some(folder) => Ok(folder),
            None => exn::bail!(ErrorKind::NotFound("folder".to_string())),
        }
    }
}

fn visible_to(document: &Document, viewer: Option<UserId>) -> bool {
    document.is_public || Some(document.user_id) == viewer
}

/// Case-insensitive approximation of a web-search full-text match: every
/// word of the query appears in the content.
fn full_text_match(content: &str, query: &str) -> bool {
    let content = content.to_lowercase();
    query
        .split_whitespace()
        .all(|word| content.contains(&word.to_lowercase()))
}

fn matches(document: &Document, query: &DocumentQuery, viewer: Option<UserId>) -> bool {
    if let Some(text) = query.text() {
        let in_title = document.title.to_lowercase().contains(&text.to_lowercase());
        if !in_title && !full_text_match(&document.content, text) {
            return false;
        }
    }
    if query.file_type.is_some_and(|kind| kind != document.file_type) {
        return false;
    }
    let in_folder = match query.folder {
        FolderFilter::Any => true,
        FolderFilter::Unfiled => document.folder_id.is_none(),
        FolderFilter::In(folder) => document.folder_id == Some(folder),
    };
    if !in_folder {
        return false;
    }
    if query.tag().is_some_and(|tag| !document.tags.contains(tag)) {
        return false;
    }
    if query.ids.as_ref().is_some_and(|ids| !ids.contains(&document.id)) {
        return false;
    }
    match (query.scope, viewer) {
        (Scope::Own(user), _) => document.user_id == user && visible_to(document, viewer),
        (Scope::Public, _) | (Scope::Accessible, None) => document.is_public,
        (Scope::Accessible, Some(_)) => visible_to(document, viewer),
    }
}

/// In-memory backend for testing.
///
/// Simulates the parts of the backend-as-a-service the application relies
/// on: password accounts with optional email confirmation, row-level
/// security (a document is readable by its owner, or by anyone when public;
/// everything else is owner-only), sibling-unique folder names, soft-deleted
/// folders and unique favourites. Error responses go through the same
/// user-facing mapping as the HTTP backend.
///
/// # Examples
///
/// ```
/// use docshelf_client::{AuthService, backend::MockBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::default();
/// backend.add_user("ada@example.com", "secret1").await;
/// let session = backend.sign_in("ada@example.com", "secret1").await?;
/// assert_eq!(session.user.email, "ada@example.com");
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockBackend {
    state: RwLock<State>,
    require_confirmation: AtomicBool,
    fail_inserts: AtomicBool,
    offline: AtomicBool,
}

impl MockBackend {
    /// Register a confirmed account, returning its id.
    pub async fn add_user(&self, email: &str, password: &str) -> UserId {
        let mut state = self.state.write().await;
        let id = UserId::new(Uuid::new_v4());
        let created_at = state.tick();
        state.accounts.push(Account {
            id,
            email: email.to_string(),
            password: password.to_string(),
            confirmed: true,
        });
        state.profiles.insert(id, new_profile(id, email, created_at));
        id
    }

    /// Make sign-up require email confirmation before sign-in.
    pub fn require_confirmation(&self, required: bool) {
        self.require_confirmation.store(required, Ordering::SeqCst);
    }

    /// Confirm a pending account, as following the emailed link would.
    pub async fn confirm(&self, email: &str) -> bool {
        let mut state = self.state.write().await;
        match state.accounts.iter_mut().find(|account| account.email.eq_ignore_ascii_case(email)) {
            Some(account) => {
                account.confirmed = true;
                true
            },
            None => false,
        }
    }

    /// Make every subsequent document insert fail with a retryable error.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent call fail with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Invalidate a session server-side, as token expiry would.
    pub async fn expire(&self, session: &Session) {
        self.state.write().await.tokens.remove(session.access_token.expose());
    }

    /// Number of document rows across all users.
    pub async fn document_count(&self) -> usize {
        self.state.read().await.documents.len()
    }

    fn reachable(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Network);
        }
        Ok(())
    }
}

fn new_profile(id: UserId, email: &str, created_at: OffsetDateTime) -> UserProfile {
    UserProfile {
        id,
        email: email.to_string(),
        display_name: None,
        role: Role::Member,
        theme: Theme::System,
        created_at,
    }
}

fn auth_error(raw: &str) -> ErrorKind {
    ErrorKind::Auth(auth_message(raw))
}

#[async_trait]
impl AuthService for MockBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let Some(account) = state
            .accounts
            .iter()
            .find(|account| account.email.eq_ignore_ascii_case(email.trim()) && account.password == password)
        else {
            exn::bail!(auth_error("Invalid login credentials"));
        };
        if !account.confirmed {
            exn::bail!(auth_error("Email not confirmed"));
        }
        let user = AuthUser {
            id: account.id,
            email: account.email.clone(),
        };
        let token = format!("mock-{}", Uuid::new_v4().simple());
        state.tokens.insert(token.clone(), user.id);
        let now = state.tick();
        Ok(Session {
            user,
            access_token: AccessToken::new(token),
            refresh_token: None,
            expires_at: Some(now + SESSION_LIFETIME),
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        self.reachable()?;
        let email = email.trim();
        {
            let mut state = self.state.write().await;
            let Some((local, domain)) = email.split_once('@') else {
                exn::bail!(auth_error("Unable to validate email address: invalid format"));
            };
            if local.is_empty() || !domain.contains('.') {
                exn::bail!(auth_error("Unable to validate email address: invalid format"));
            }
            if password.chars().count() < MIN_PASSWORD_LENGTH {
                exn::bail!(auth_error("Password should be at least 6 characters."));
            }
            if state.accounts.iter().any(|account| account.email.eq_ignore_ascii_case(email)) {
                exn::bail!(auth_error("User already registered"));
            }
            let id = UserId::new(Uuid::new_v4());
            let created_at = state.tick();
            state.accounts.push(Account {
                id,
                email: email.to_string(),
                password: password.to_string(),
                confirmed: !self.require_confirmation.load(Ordering::SeqCst),
            });
            state.profiles.insert(id, new_profile(id, email, created_at));
        }
        if self.require_confirmation.load(Ordering::SeqCst) {
            return Ok(SignUpOutcome::ConfirmationRequired {
                email: email.to_string(),
            });
        }
        Ok(SignUpOutcome::SignedIn(self.sign_in(email, password).await?))
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        self.reachable()?;
        self.state.write().await.tokens.remove(session.access_token.expose());
        Ok(())
    }

    async fn current_user(&self, session: &Session) -> Result<AuthUser> {
        self.reachable()?;
        let state = self.state.read().await;
        let user = state.authorize(session)?;
        match state.accounts.iter().find(|account| account.id == user) {
            Some(account) => Ok(AuthUser {
                id: account.id,
                email: account.email.clone(),
            }),
            None => exn::bail!(ErrorKind::Unauthorized),
        }
    }
}

#[async_trait]
impl DocumentStore for MockBackend {
    async fn search_documents(&self, session: Option<&Session>, query: &DocumentQuery) -> Result<Vec<Document>> {
        self.reachable()?;
        let state = self.state.read().await;
        let viewer = state.viewer(session)?;
        let mut found: Vec<Document> = state
            .documents
            .iter()
            .filter(|document| matches(document, query, viewer))
            .map(|document| state.present(document))
            .collect();
        match query.sort {
            SortOrder::Newest => found.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::Oldest => found.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::Title => found.sort_by(|a, b| a.title.cmp(&b.title)),
        }
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn get_document(&self, session: Option<&Session>, id: DocumentId) -> Result<Document> {
        self.reachable()?;
        let state = self.state.read().await;
        let viewer = state.viewer(session)?;
        match state
            .documents
            .iter()
            .find(|document| document.id == id && visible_to(document, viewer))
        {
            Some(document) => Ok(state.present(document)),
            None => exn::bail!(ErrorKind::NotFound("document".to_string())),
        }
    }

    async fn insert_document(&self, session: &Session, document: &NewDocument) -> Result<Document> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let user = state.authorize(session)?;
        if self.fail_inserts.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::BackendError {
                status: 503,
                message: "insert failure injected".to_string(),
            });
        }
        if document.user_id != user {
            exn::bail!(ErrorKind::PermissionDenied("documents".to_string()));
        }
        state.check_parent(user, document.folder_id)?;
        let created_at = state.tick();
        let row = Document {
            id: DocumentId::new(Uuid::new_v4()),
            user_id: user,
            title: document.title.clone(),
            content: document.content.clone(),
            file_type: document.file_type,
            mime_type: Some(document.mime_type.clone()),
            file_size: document.file_size,
            file_url: document.file_url.clone(),
            storage_path: Some(document.storage_path.clone()),
            is_public: document.is_public,
            tags: document.tags.clone(),
            folder_id: document.folder_id,
            folder_name: None,
            created_at,
            is_favorite: false,
        };
        let presented = state.present(&row);
        state.documents.push(row);
        Ok(presented)
    }

    async fn update_document(&self, session: &Session, id: DocumentId, changes: &DocumentChanges) -> Result<Document> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let user = state.authorize(session)?;
        if let Some(folder) = changes.folder_id {
            state.check_parent(user, folder)?;
        }
        let document = state.owned_document_mut(user, id)?;
        if let Some(title) = &changes.title {
            document.title = title.clone();
        }
        if let Some(tags) = &changes.tags {
            document.tags = tags.clone();
        }
        if let Some(is_public) = changes.is_public {
            document.is_public = is_public;
        }
        if let Some(folder) = changes.folder_id {
            document.folder_id = folder;
        }
        let updated = document.clone();
        Ok(state.present(&updated))
    }

    async fn move_documents(&self, session: &Session, ids: &[DocumentId], folder: Option<FolderId>) -> Result<usize> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let user = state.authorize(session)?;
        state.check_parent(user, folder)?;
        let mut moved = 0;
        for document in state
            .documents
            .iter_mut()
            .filter(|document| document.user_id == user && ids.contains(&document.id))
        {
            document.folder_id = folder;
            moved += 1;
        }
        Ok(moved)
    }

    async fn delete_document(&self, session: &Session, id: DocumentId) -> Result<Document> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let user = state.authorize(session)?;
        let Some(index) = state
            .documents
            .iter()
            .position(|document| document.id == id && document.user_id == user)
        else {
            exn::bail!(ErrorKind::NotFound("document".to_string()));
        };
        let presented = state.present(&state.documents[index]);
        state.documents.remove(index);
        state.favorites.retain(|(_, document)| *document != id);
        Ok(presented)
    }

    async fn favorite_ids(&self, session: &Session) -> Result<Vec<DocumentId>> {
        self.reachable()?;
        let state = self.state.read().await;
        let user = state.authorize(session)?;
        let mut ids: Vec<DocumentId> = state
            .favorites
            .iter()
            .filter(|(owner, _)| *owner == user)
            .map(|(_, document)| *document)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn add_favorite(&self, session: &Session, id: DocumentId) -> Result<()> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let user = state.authorize(session)?;
        if !state
            .documents
            .iter()
            .any(|document| document.id == id && visible_to(document, Some(user)))
        {
            exn::bail!(ErrorKind::Conflict(format!("document {id} does not exist")));
        }
        if !state.favorites.insert((user, id)) {
            exn::bail!(ErrorKind::Conflict("document is already a favorite".to_string()));
        }
        Ok(())
    }

    async fn remove_favorite(&self, session: &Session, id: DocumentId) -> Result<()> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let user = state.authorize(session)?;
        if !state.favorites.remove(&(user, id)) {
            exn::bail!(ErrorKind::NotFound("favorite".to_string()));
        }
        Ok(())
    }

    async fn dashboard(&self, session: &Session) -> Result<DashboardData> {
        self.reachable()?;
        let state = self.state.read().await;
        let user = state.authorize(session)?;
        let mut own: Vec<&Document> = state.documents.iter().filter(|document| document.user_id == user).collect();
        own.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(DashboardData {
            total_documents: own.len() as u64,
            pdf_count: own.iter().filter(|document| document.file_type == FileKind::Pdf).count() as u64,
            image_count: own.iter().filter(|document| document.file_type == FileKind::Image).count() as u64,
            total_bytes: own.iter().map(|document| document.file_size).sum(),
            favorite_count: state.favorites.iter().filter(|(owner, _)| *owner == user).count() as u64,
            folder_count: state
                .folders
                .iter()
                .filter(|folder| folder.user_id == user && !folder.is_deleted)
                .count() as u64,
            recent_documents: own
                .into_iter()
                .take(RECENT_DOCUMENTS)
                .map(|document| state.present(document))
                .collect(),
        })
    }
}

#[async_trait]
impl FolderStore for MockBackend {
    async fn folder_tree(&self, session: &Session) -> Result<Vec<Folder>> {
        self.reachable()?;
        let state = self.state.read().await;
        let user = state.authorize(session)?;
        Ok(state
            .folders
            .iter()
            .filter(|folder| folder.user_id == user && !folder.is_deleted)
            .map(|folder| state.present_folder(folder))
            .collect())
    }

    async fn create_folder(&self, session: &Session, name: &FolderName, parent: Option<FolderId>) -> Result<Folder> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let user = state.authorize(session)?;
        state.check_parent(user, parent)?;
        state.check_sibling_name(user, parent, name, None)?;
        let now = state.tick();
        let folder = Folder {
            id: FolderId::new(Uuid::new_v4()),
            user_id: user,
            name: name.clone(),
            parent_id: parent,
            document_count: 0,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        };
        state.folders.push(folder.clone());
        Ok(folder)
    }

    async fn rename_folder(&self, session: &Session, id: FolderId, name: &FolderName) -> Result<Folder> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let user = state.authorize(session)?;
        let parent = state.owned_folder_mut(user, id)?.parent_id;
        state.check_sibling_name(user, parent, name, Some(id))?;
        let now = state.tick();
        let folder = state.owned_folder_mut(user, id)?;
        folder.name = name.clone();
        folder.updated_at = now;
        let renamed = folder.clone();
        Ok(state.present_folder(&renamed))
    }

    async fn move_folder(&self, session: &Session, id: FolderId, parent: Option<FolderId>) -> Result<Folder> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let user = state.authorize(session)?;
        state.check_parent(user, parent)?;
        let name = state.owned_folder_mut(user, id)?.name.clone();
        state.check_sibling_name(user, parent, &name, Some(id))?;
        let now = state.tick();
        let folder = state.owned_folder_mut(user, id)?;
        folder.parent_id = parent;
        folder.updated_at = now;
        let moved = folder.clone();
        Ok(state.present_folder(&moved))
    }

    async fn can_delete_folder(&self, session: &Session, id: FolderId) -> Result<bool> {
        self.reachable()?;
        let state = self.state.read().await;
        let user = state.authorize(session)?;
        if state.live_folder(user, id).is_none() {
            exn::bail!(ErrorKind::NotFound("folder".to_string()));
        }
        let has_documents = state.documents.iter().any(|document| document.folder_id == Some(id));
        let has_children = state
            .folders
            .iter()
            .any(|folder| folder.parent_id == Some(id) && !folder.is_deleted);
        Ok(!has_documents && !has_children)
    }

    async fn delete_folder(&self, session: &Session, id: FolderId) -> Result<()> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let user = state.authorize(session)?;
        let now = state.tick();
        let folder = state.owned_folder_mut(user, id)?;
        folder.is_deleted = true;
        folder.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MockBackend {
    async fn profile(&self, session: &Session) -> Result<UserProfile> {
        self.reachable()?;
        let state = self.state.read().await;
        let user = state.authorize(session)?;
        match state.profiles.get(&user) {
            Some(profile) => Ok(profile.clone()),
            None => exn::bail!(ErrorKind::NotFound("profile".to_string())),
        }
    }

    async fn update_profile(&self, session: &Session, changes: &ProfileChanges) -> Result<UserProfile> {
        self.reachable()?;
        let mut state = self.state.write().await;
        let user = state.authorize(session)?;
        let Some(profile) = state.profiles.get_mut(&user) else {
            exn::bail!(ErrorKind::NotFound("profile".to_string()));
        };
        if let Some(display_name) = &changes.display_name {
            let display_name = display_name.trim();
            profile.display_name = (!display_name.is_empty()).then(|| display_name.to_string());
        }
        if let Some(theme) = changes.theme {
            profile.theme = theme;
        }
        Ok(profile.clone())
    }
}
