//! HTTP backend.
//!
//! Speaks the three APIs of the backend-as-a-service:
//!
//! - auth (`/auth/v1/...`): password grant, sign-up, logout, current user;
//! - rows (`/rest/v1/<table>`): PostgREST filters, ordering and joins;
//! - procedures (`/rest/v1/rpc/<name>`): folder tree, folder emptiness,
//!   dashboard counters.
//!
//! Every request carries the project's anonymous key in the `apikey` header.
//! The bearer token is the session's access token when there is a session,
//! and the anonymous key otherwise.

use crate::auth::{AuthUser, Session, SignUpOutcome, auth_message};
use crate::backend::{AuthService, DocumentStore, FolderStore, ProfileStore};
use crate::error::{Error, ErrorKind, Result};
use crate::query::{Direction, Filter, Query};
use crate::request::{
    DocumentChanges, DocumentQuery, FolderFilter, NewDocument, ProfileChanges, Scope, SortOrder,
};
use crate::rows::{
    AuthErrorRow, DOCUMENT_COLUMNS, DashboardRow, DocumentRow, FavoriteRow, FolderRow, ProfileRow, RestErrorRow,
    SessionRow, SignUpRow, UserRow, single,
};
use async_trait::async_trait;
use docshelf_model::{DashboardData, Document, DocumentId, Folder, FolderId, FolderName, UserProfile};
use exn::{OptionExt, ResultExt};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::instrument;
use url::Url;

const DOCUMENTS: &str = "documents";
const FOLDERS: &str = "folders";
const FAVORITES: &str = "favorites";
const PROFILES: &str = "user_profiles";

/// HTTP client for the backend-as-a-service.
///
/// The underlying HTTP client has no request timeout; failures are detected
/// from error responses only.
///
/// # Examples
///
/// ```no_run
/// use docshelf_client::{AuthService, RestBackend};
///
/// # async fn example() -> docshelf_client::error::Result<()> {
/// let backend = RestBackend::new("https://project.supabase.co", "public-anon-key")?;
/// let session = backend.sign_in("ada@example.com", "correct horse").await?;
/// println!("signed in as {}", session.user.email);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base: Url,
    anon_key: String,
}

/// Procedures returning a composite answer either as an object or as a
/// single-row set.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl RestBackend {
    pub fn new(base_url: impl AsRef<str>, anon_key: impl Into<String>) -> Result<Self> {
        let base_url = base_url.as_ref();
        let base = Url::parse(base_url).or_raise(|| ErrorKind::Configuration(base_url.to_string()))?;
        if base.cannot_be_a_base() {
            exn::bail!(ErrorKind::Configuration(base_url.to_string()));
        }
        let anon_key = anon_key.into();
        if anon_key.trim().is_empty() {
            exn::bail!(ErrorKind::Configuration("anonymous key is empty".to_string()));
        }
        let client = Client::builder()
            .user_agent(concat!("docshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Configuration("could not build HTTP client".to_string()))?;
        Ok(Self { client, base, anon_key })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .ok()
            .ok_or_raise(|| ErrorKind::Configuration(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, session: Option<&Session>) -> RequestBuilder {
        let builder = self.client.request(method, url).header("apikey", &self.anon_key);
        match session {
            Some(session) => builder.bearer_auth(session.access_token.expose()),
            None => builder.bearer_auth(&self.anon_key),
        }
    }

    fn table(&self, method: Method, table: &str, session: Option<&Session>) -> Result<RequestBuilder> {
        Ok(self.request(method, self.endpoint(&["rest", "v1", table])?, session))
    }

    /// Send a rows/procedure request, mapping error statuses.
    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = builder.send().await.or_raise(|| ErrorKind::Network)?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%status, what, body, "Backend rejected request");
        exn::bail!(rest_error(status, &body, what))
    }

    /// Send an auth request, mapping error bodies to user-facing messages.
    async fn send_auth(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.or_raise(|| ErrorKind::Network)?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%status, body, "Auth service rejected request");
        if status == StatusCode::UNAUTHORIZED {
            exn::bail!(ErrorKind::Unauthorized);
        }
        let parsed: AuthErrorRow = serde_json::from_str(&body).unwrap_or_default();
        let raw = parsed.into_message().unwrap_or_else(|| body.trim().to_string());
        if raw.is_empty() {
            exn::bail!(ErrorKind::BackendError {
                status: status.as_u16(),
                message: status.to_string(),
            });
        }
        exn::bail!(ErrorKind::Auth(auth_message(&raw)))
    }

    async fn body<T: DeserializeOwned>(response: Response, what: &'static str) -> Result<T> {
        let bytes = response.bytes().await.or_raise(|| ErrorKind::Network)?;
        serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidResponse(what))
    }

    /// Run a query, converting every row.
    async fn select<R, T>(&self, session: Option<&Session>, query: &Query) -> Result<Vec<T>>
    where
        R: DeserializeOwned,
        T: TryFrom<R, Error = Error>,
    {
        let builder = self.table(Method::GET, query.table_name(), session)?.query(&query.to_params());
        let response = self.send(builder, query.table_name()).await?;
        let rows: Vec<R> = Self::body(response, "rows").await?;
        rows.into_iter().map(T::try_from).collect()
    }

    /// Insert, update or delete, returning the affected rows.
    async fn write<R, T>(
        &self,
        method: Method,
        session: &Session,
        query: &Query,
        body: Option<serde_json::Value>,
    ) -> Result<Vec<T>>
    where
        R: DeserializeOwned,
        T: TryFrom<R, Error = Error>,
    {
        let mut builder = self
            .table(method, query.table_name(), Some(session))?
            .query(&query.to_params())
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = self.send(builder, query.table_name()).await?;
        let rows: Vec<R> = Self::body(response, "rows").await?;
        rows.into_iter().map(T::try_from).collect()
    }

    async fn rpc<R: DeserializeOwned>(&self, session: &Session, name: &str, args: serde_json::Value) -> Result<R> {
        let url = self.endpoint(&["rest", "v1", "rpc", name])?;
        let builder = self.request(Method::POST, url, Some(session)).json(&args);
        let response = self.send(builder, name).await?;
        Self::body(response, "procedure result").await
    }
}

fn rest_error(status: StatusCode, body: &str, what: &str) -> ErrorKind {
    let parsed: RestErrorRow = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .map(|message| match parsed.details {
            Some(details) if !details.is_empty() => format!("{message} ({details})"),
            _ => message,
        })
        .unwrap_or_else(|| body.trim().to_string());
    match (status.as_u16(), parsed.code.as_deref()) {
        // JWT expired or invalid.
        (401, _) | (_, Some("PGRST301" | "PGRST302" | "PGRST303")) => ErrorKind::Unauthorized,
        // Unique and foreign key violations.
        (409, _) | (_, Some("23505" | "23503")) => ErrorKind::Conflict(message),
        (403, _) | (_, Some("42501")) => ErrorKind::PermissionDenied(what.to_string()),
        (404, _) => ErrorKind::NotFound(what.to_string()),
        (status, _) => ErrorKind::BackendError { status, message },
    }
}

fn document_query(query: &DocumentQuery, session: Option<&Session>) -> Query {
    let mut rows = Query::table(DOCUMENTS).select(DOCUMENT_COLUMNS);
    if let Some(text) = query.text() {
        rows = rows.filter(Filter::Any(vec![
            Filter::ilike("title", format!("*{text}*")),
            Filter::full_text("content", text),
        ]));
    }
    if let Some(kind) = query.file_type {
        rows = rows.eq("file_type", kind);
    }
    match query.folder {
        FolderFilter::Any => {},
        FolderFilter::Unfiled => rows = rows.filter(Filter::is_null("folder_id")),
        FolderFilter::In(folder) => rows = rows.eq("folder_id", folder),
    }
    if let Some(tag) = query.tag() {
        rows = rows.filter(Filter::contains("tags", [tag]));
    }
    if let Some(ids) = &query.ids {
        rows = rows.filter(Filter::in_list("id", ids));
    }
    match (query.scope, session) {
        (Scope::Own(user), _) => rows = rows.eq("user_id", user),
        (Scope::Public, _) | (Scope::Accessible, None) => rows = rows.eq("is_public", true),
        (Scope::Accessible, Some(_)) => {},
    }
    rows = match query.sort {
        SortOrder::Newest => rows.order("created_at", Direction::Descending),
        SortOrder::Oldest => rows.order("created_at", Direction::Ascending),
        SortOrder::Title => rows.order("title", Direction::Ascending),
    };
    match query.limit {
        Some(limit) => rows.limit(limit),
        None => rows,
    }
}

#[async_trait]
impl AuthService for RestBackend {
    #[instrument(level = "debug", skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut url = self.endpoint(&["auth", "v1", "token"])?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let builder = self.request(Method::POST, url, None).json(&json!({ "email": email, "password": password }));
        let response = self.send_auth(builder).await?;
        let row: SessionRow = Self::body(response, "session").await?;
        Session::try_from(row)
    }

    #[instrument(level = "debug", skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let url = self.endpoint(&["auth", "v1", "signup"])?;
        let builder = self.request(Method::POST, url, None).json(&json!({ "email": email, "password": password }));
        let response = self.send_auth(builder).await?;
        Ok(match Self::body::<SignUpRow>(response, "sign-up").await? {
            SignUpRow::Session(row) => SignUpOutcome::SignedIn(Session::try_from(row)?),
            SignUpRow::User(user) => SignUpOutcome::ConfirmationRequired {
                email: user.email.unwrap_or_else(|| email.to_string()),
            },
        })
    }

    #[instrument(level = "debug", skip_all)]
    async fn sign_out(&self, session: &Session) -> Result<()> {
        let url = self.endpoint(&["auth", "v1", "logout"])?;
        match self.send_auth(self.request(Method::POST, url, Some(session))).await {
            Ok(_) => Ok(()),
            // Already expired or revoked: nothing left to sign out of.
            Err(err) if matches!(&*err, ErrorKind::Unauthorized) => {
                tracing::debug!("Session was already invalid");
                Ok(())
            },
            Err(err) => Err(err),
        }
    }

    async fn current_user(&self, session: &Session) -> Result<AuthUser> {
        let url = self.endpoint(&["auth", "v1", "user"])?;
        let response = self.send_auth(self.request(Method::GET, url, Some(session))).await?;
        Ok(Self::body::<UserRow>(response, "user").await?.into())
    }
}

#[async_trait]
impl DocumentStore for RestBackend {
    #[instrument(level = "debug", skip(self, session))]
    async fn search_documents(&self, session: Option<&Session>, query: &DocumentQuery) -> Result<Vec<Document>> {
        if query.ids.as_ref().is_some_and(Vec::is_empty) {
            return Ok(Vec::new());
        }
        self.select::<DocumentRow, Document>(session, &document_query(query, session)).await
    }

    #[instrument(level = "debug", skip(self, session))]
    async fn get_document(&self, session: Option<&Session>, id: DocumentId) -> Result<Document> {
        let query = Query::table(DOCUMENTS).select(DOCUMENT_COLUMNS).eq("id", id).limit(1);
        single(self.select::<DocumentRow, Document>(session, &query).await?, "document")
    }

    #[instrument(level = "debug", skip_all, fields(title = %document.title))]
    async fn insert_document(&self, session: &Session, document: &NewDocument) -> Result<Document> {
        let query = Query::table(DOCUMENTS).select(DOCUMENT_COLUMNS);
        let body = serde_json::to_value(document).or_raise(|| ErrorKind::InvalidResponse("document"))?;
        let rows = self.write::<DocumentRow, Document>(Method::POST, session, &query, Some(body)).await?;
        single(rows, "inserted document")
    }

    #[instrument(level = "debug", skip(self, session, changes))]
    async fn update_document(&self, session: &Session, id: DocumentId, changes: &DocumentChanges) -> Result<Document> {
        if changes.is_empty() {
            return self.get_document(Some(session), id).await;
        }
        let query = Query::table(DOCUMENTS).select(DOCUMENT_COLUMNS).eq("id", id);
        let body = serde_json::to_value(changes).or_raise(|| ErrorKind::InvalidResponse("changes"))?;
        single(self.write::<DocumentRow, Document>(Method::PATCH, session, &query, Some(body)).await?, "document")
    }

    #[instrument(level = "debug", skip(self, session, ids), fields(count = ids.len()))]
    async fn move_documents(&self, session: &Session, ids: &[DocumentId], folder: Option<FolderId>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let query = Query::table(DOCUMENTS).select(DOCUMENT_COLUMNS).filter(Filter::in_list("id", ids));
        let body = json!({ "folder_id": folder });
        let moved = self.write::<DocumentRow, Document>(Method::PATCH, session, &query, Some(body)).await?;
        Ok(moved.len())
    }

    #[instrument(level = "debug", skip(self, session))]
    async fn delete_document(&self, session: &Session, id: DocumentId) -> Result<Document> {
        let query = Query::table(DOCUMENTS).select(DOCUMENT_COLUMNS).eq("id", id);
        single(self.write::<DocumentRow, Document>(Method::DELETE, session, &query, None).await?, "document")
    }

    async fn favorite_ids(&self, session: &Session) -> Result<Vec<DocumentId>> {
        let query = Query::table(FAVORITES).select("document_id").eq("user_id", session.user_id());
        let builder = self.table(Method::GET, FAVORITES, Some(session))?.query(&query.to_params());
        let rows: Vec<FavoriteRow> = Self::body(self.send(builder, FAVORITES).await?, "favorites").await?;
        Ok(rows.into_iter().map(|row| row.document_id.into()).collect())
    }

    #[instrument(level = "debug", skip(self, session))]
    async fn add_favorite(&self, session: &Session, id: DocumentId) -> Result<()> {
        let builder = self
            .table(Method::POST, FAVORITES, Some(session))?
            .header("Prefer", "return=minimal")
            .json(&json!({ "user_id": session.user_id(), "document_id": id }));
        self.send(builder, "favorite").await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, session))]
    async fn remove_favorite(&self, session: &Session, id: DocumentId) -> Result<()> {
        let query = Query::table(FAVORITES).eq("user_id", session.user_id()).eq("document_id", id);
        let builder = self
            .table(Method::DELETE, FAVORITES, Some(session))?
            .query(&query.to_params())
            .header("Prefer", "return=representation");
        let removed: Vec<FavoriteRow> = Self::body(self.send(builder, "favorite").await?, "favorites").await?;
        if removed.is_empty() {
            exn::bail!(ErrorKind::NotFound("favorite".to_string()));
        }
        Ok(())
    }

    async fn dashboard(&self, session: &Session) -> Result<DashboardData> {
        let args = json!({ "user_uuid": session.user_id() });
        let row = match self.rpc::<OneOrMany<DashboardRow>>(session, "get_dashboard_data", args).await? {
            OneOrMany::One(row) => row,
            OneOrMany::Many(rows) => single(rows, "dashboard")?,
        };
        DashboardData::try_from(row)
    }
}

#[async_trait]
impl FolderStore for RestBackend {
    #[instrument(level = "debug", skip_all)]
    async fn folder_tree(&self, session: &Session) -> Result<Vec<Folder>> {
        let args = json!({ "user_uuid": session.user_id() });
        let rows: Vec<FolderRow> = self.rpc(session, "get_folder_tree", args).await?;
        let folders = rows.into_iter().map(Folder::try_from).collect::<Result<Vec<_>>>()?;
        Ok(folders.into_iter().filter(|folder| !folder.is_deleted).collect())
    }

    #[instrument(level = "debug", skip(self, session))]
    async fn create_folder(&self, session: &Session, name: &FolderName, parent: Option<FolderId>) -> Result<Folder> {
        let query = Query::table(FOLDERS);
        let body = json!({ "user_id": session.user_id(), "name": name, "parent_id": parent });
        single(self.write::<FolderRow, Folder>(Method::POST, session, &query, Some(body)).await?, "folder")
    }

    #[instrument(level = "debug", skip(self, session))]
    async fn rename_folder(&self, session: &Session, id: FolderId, name: &FolderName) -> Result<Folder> {
        let query = Query::table(FOLDERS).eq("id", id);
        let body = json!({ "name": name });
        single(self.write::<FolderRow, Folder>(Method::PATCH, session, &query, Some(body)).await?, "folder")
    }

    #[instrument(level = "debug", skip(self, session))]
    async fn move_folder(&self, session: &Session, id: FolderId, parent: Option<FolderId>) -> Result<Folder> {
        let query = Query::table(FOLDERS).eq("id", id);
        let body = json!({ "parent_id": parent });
        single(self.write::<FolderRow, Folder>(Method::PATCH, session, &query, Some(body)).await?, "folder")
    }

    async fn can_delete_folder(&self, session: &Session, id: FolderId) -> Result<bool> {
        self.rpc(session, "can_delete_folder", json!({ "folder_uuid": id })).await
    }

    #[instrument(level = "debug", skip(self, session))]
    async fn delete_folder(&self, session: &Session, id: FolderId) -> Result<()> {
        let query = Query::table(FOLDERS).eq("id", id);
        let body = json!({ "is_deleted": true });
        single(self.write::<FolderRow, Folder>(Method::PATCH, session, &query, Some(body)).await?, "folder")?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for RestBackend {
    async fn profile(&self, session: &Session) -> Result<UserProfile> {
        let query = Query::table(PROFILES).eq("id", session.user_id()).limit(1);
        single(self.select::<ProfileRow, UserProfile>(Some(session), &query).await?, "profile")
    }

    #[instrument(level = "debug", skip_all)]
    async fn update_profile(&self, session: &Session, changes: &ProfileChanges) -> Result<UserProfile> {
        let query = Query::table(PROFILES).eq("id", session.user_id());
        let body = serde_json::to_value(changes).or_raise(|| ErrorKind::InvalidResponse("profile"))?;
        single(self.write::<ProfileRow, UserProfile>(Method::PATCH, session, &query, Some(body)).await?, "profile")
    }
}
