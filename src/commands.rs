//! Command handlers.
//!
//! Each invocation builds a fresh [`Context`], signs in when the command
//! needs a user, runs one library operation and prints the result. Progress
//! and notices go to stderr; results go to stdout.

use crate::cli::{Cli, Command, Credentials, FolderAction, ScopeArg, SearchArgs, UpdateArgs, UploadArgs};
use crate::error::{ErrorKind, Result};
use docshelf_client::{DocumentChanges, DocumentQuery, FolderFilter, RestBackend, Scope, Session, SignUpOutcome};
use docshelf_config::{Config, OcrConfig};
use docshelf_extract::count_pdf_pages;
use docshelf_library::error::ErrorKind as LibraryErrorKind;
use docshelf_library::upload::{UploadEvent, UploadRequest, UploadStage, UploadTracker};
use docshelf_library::{AppState, Context, Notice, RecognizerHandle, Route, ViewerState, documents, folders, upload};
use docshelf_model::{Document, DocumentId, FileKind, FolderId, Tags, tree};
use docshelf_ocr::error::{ErrorKind as OcrErrorKind, Result as OcrResult};
use docshelf_ocr::{Tesseract, TextRecognizer};
use docshelf_storage::backend::HttpBackend;
use docshelf_storage::{Bucket, BucketNames};
use exn::ResultExt;
use futures::StreamExt;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

const STORAGE_NAME: &str = "supabase";
const EXCERPT_CHARS: usize = 60;

pub async fn run(cli: Cli) -> Result<()> {
    // Routing is local; it needs neither configuration nor a backend.
    if let Command::Route { path } = &cli.command {
        return route(path, cli.json);
    }
    let config = Config::load(cli.config.as_deref()).map_err(ErrorKind::config)?;
    let mut shell = Shell {
        ctx: context(&config)?,
        state: AppState::default(),
        credentials: cli.credentials,
        json: cli.json,
    };
    shell.dispatch(cli.command).await
}

fn context(config: &Config) -> Result<Context> {
    let url = config.backend.url().map_err(ErrorKind::config)?;
    let anon_key = config.backend.anon_key().map_err(ErrorKind::config)?;
    let backend = RestBackend::new(url, anon_key)
        .map_err(LibraryErrorKind::backend)
        .map_err(ErrorKind::library)?;
    let buckets = BucketNames {
        pdf: config.storage.pdf_bucket.clone(),
        image: config.storage.image_bucket.clone(),
    };
    let storage = HttpBackend::new(STORAGE_NAME, url, anon_key, buckets)
        .map_err(LibraryErrorKind::storage)
        .map_err(ErrorKind::library)?;
    Context::from_config(config, Arc::new(backend), Arc::new(storage), recognizer(&config.ocr))
        .map_err(ErrorKind::library)
}

/// Stands in for a recognition engine that couldn't be found. Uploads of
/// images still succeed, just without text.
struct Unavailable(OcrErrorKind);
impl TextRecognizer for Unavailable {
    fn recognize(&self, _image: &[u8], _language: &str) -> OcrResult<String> {
        exn::bail!(self.0.clone())
    }
}

fn recognizer(config: &OcrConfig) -> RecognizerHandle {
    let engine = match &config.executable {
        Some(path) => Tesseract::at(path),
        None => Tesseract::discover(),
    };
    match engine {
        Ok(engine) => Arc::new(engine),
        Err(err) => {
            tracing::debug!(error = ?err, "OCR engine unavailable, images will be stored without text");
            Arc::new(Unavailable((*err).clone()))
        },
    }
}

fn route(path: &str, json: bool) -> Result<()> {
    let resolved = Route::resolve(path);
    if json {
        return print_json(&json!({ "route": resolved.route.path(), "redirected": resolved.redirected }));
    }
    match resolved.route {
        Route::Shell if resolved.redirected => println!("{} (redirected from {path})", resolved.route),
        route => println!("{route}"),
    }
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let output = serde_json::to_string_pretty(value).or_raise(|| ErrorKind::Output)?;
    println!("{output}");
    Ok(())
}

fn notify(notice: Notice) {
    eprintln!("{notice}");
}

fn usage(message: impl Into<String>) -> crate::error::Error {
    ErrorKind::Usage(message.into()).into()
}

fn document_line(document: &Document) -> String {
    format!(
        "{}  {:<5} {}{}  {}",
        document.id,
        document.file_type.as_str(),
        if document.is_favorite { "* " } else { "" },
        document.title,
        document.excerpt(EXCERPT_CHARS)
    )
}

struct Shell {
    ctx: Context,
    state: AppState,
    credentials: Credentials,
    json: bool,
}

impl Shell {
    fn has_credentials(&self) -> bool {
        self.credentials.email.is_some()
    }

    fn credentials(&self) -> Result<(String, String)> {
        match (&self.credentials.email, &self.credentials.password) {
            (Some(email), Some(password)) => Ok((email.clone(), password.clone())),
            _ => Err(usage(
                "Email and password are required: pass --email and --password, or set DOCSHELF_EMAIL and DOCSHELF_PASSWORD.",
            )),
        }
    }

    async fn sign_in(&mut self) -> Result<Session> {
        if let Ok(session) = self.state.session() {
            return Ok(session.clone());
        }
        let (email, password) = self.credentials()?;
        let session = self.state.sign_in(&self.ctx, &email, &password).await.map_err(ErrorKind::library)?;
        Ok(session.clone())
    }

    /// Sign in when credentials were given; browse anonymously otherwise.
    async fn optional_session(&mut self) -> Result<Option<Session>> {
        if self.has_credentials() {
            self.sign_in().await.map(Some)
        } else {
            Ok(None)
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login => {
                self.sign_in().await?;
                let name = self.state.profile.as_ref().map(|profile| profile.greeting_name().to_string());
                notify(Notice::success(format!("Welcome back, {}!", name.as_deref().unwrap_or("there"))));
                Ok(())
            },
            Command::Signup => self.sign_up().await,
            Command::Logout => {
                self.sign_in().await?;
                self.state.sign_out(&self.ctx).await.map_err(ErrorKind::library)?;
                notify(Notice::success("Signed out."));
                Ok(())
            },
            Command::Whoami { theme } => {
                self.sign_in().await?;
                if let Some(theme) = theme {
                    self.state.set_theme(&self.ctx, theme).await.map_err(ErrorKind::library)?;
                }
                self.whoami()
            },
            Command::Upload(args) => self.upload(args).await,
            Command::Search(args) => self.search(args).await,
            Command::Show { id, text } => self.show(id, text).await,
            Command::Update(args) => self.update(args).await,
            Command::Delete { id } => {
                let session = self.sign_in().await?;
                let document = documents::delete(&self.ctx, &session, id).await.map_err(ErrorKind::library)?;
                notify(Notice::success(format!("Deleted \"{}\".", document.title)));
                Ok(())
            },
            Command::Favorite { id } => {
                let session = self.sign_in().await?;
                let now = documents::toggle_favorite(&self.ctx, &session, id).await.map_err(ErrorKind::library)?;
                notify(Notice::success(if now { "Added to favourites." } else { "Removed from favourites." }));
                Ok(())
            },
            Command::Move { ids, target } => {
                let session = self.sign_in().await?;
                let moved = documents::move_documents(&self.ctx, &session, &ids, target.folder())
                    .await
                    .map_err(ErrorKind::library)?;
                notify(Notice::success(format!("Moved {moved} document(s).")));
                Ok(())
            },
            Command::Share { id, access } => {
                let session = self.optional_session().await?;
                let url = documents::share(&self.ctx, session.as_ref(), id, access)
                    .await
                    .map_err(ErrorKind::library)?;
                println!("{url}");
                Ok(())
            },
            Command::Folders { action } => self.folders(action).await,
            Command::Dashboard => self.dashboard().await,
            Command::Route { path } => route(&path, self.json),
        }
    }

    async fn sign_up(&mut self) -> Result<()> {
        let (email, password) = self.credentials()?;
        let outcome = self.state.sign_up(&self.ctx, &email, &password).await.map_err(ErrorKind::library)?;
        match outcome {
            SignUpOutcome::SignedIn(session) => {
                notify(Notice::success(format!("Account created for {}.", session.user.email)));
            },
            SignUpOutcome::ConfirmationRequired { email } => notify(Notice::info(format!(
                "Account created. Check {email} for a confirmation link, then sign in."
            ))),
        }
        Ok(())
    }

    fn whoami(&self) -> Result<()> {
        let session = self.state.session().map_err(ErrorKind::library)?;
        if self.json {
            return print_json(&json!({
                "id": session.user.id,
                "email": session.user.email,
                "profile": self.state.profile,
            }));
        }
        println!("id:     {}", session.user.id);
        println!("email:  {}", session.user.email);
        if let Some(profile) = &self.state.profile {
            println!("name:   {}", profile.greeting_name());
        }
        println!("role:   {}", self.state.role.role());
        println!("theme:  {}", self.state.theme.preference());
        Ok(())
    }

    async fn upload(&mut self, args: UploadArgs) -> Result<()> {
        if args.title.is_some() && args.files.len() > 1 {
            return Err(usage("--title can only be used when uploading a single file."));
        }
        let session = self.sign_in().await?;
        let tags = args.tags.as_deref().map(Tags::parse).unwrap_or_default();
        let mut requests = Vec::with_capacity(args.files.len());
        for path in &args.files {
            let data = tokio::fs::read(path).await.or_raise(|| ErrorKind::Read(path.clone()))?;
            requests.push(UploadRequest {
                file_name: file_name_of(path),
                data,
                mime_type: None,
                title: args.title.clone(),
                tags: tags.clone(),
                folder_id: args.folder,
                is_public: args.public,
            });
        }

        let mut tracker = UploadTracker::default();
        let mut uploaded = Vec::new();
        let events = upload::upload_all(&self.ctx, &session, requests);
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            tracker.apply(&event);
            match &event {
                UploadEvent::Stage { file_name, stage, .. } if *stage != UploadStage::Queued => {
                    tracing::info!(file = %file_name, %stage, "Uploading");
                },
                UploadEvent::Warning { message, .. } => notify(Notice::warning(message.clone())),
                UploadEvent::Done { id, document } => {
                    let file_name = tracker.get(*id).map(|entry| entry.file_name.as_str()).unwrap_or_default();
                    notify(Notice::success(format!("Uploaded {file_name}.")));
                    uploaded.push(document.as_ref().clone());
                },
                UploadEvent::Failed { id, error } => {
                    let file_name = tracker.get(*id).map(|entry| entry.file_name.as_str()).unwrap_or_default();
                    eprintln!("{}", Notice::failure(&format!("Could not upload {file_name}"), error));
                },
                _ => {},
            }
        }

        if self.json {
            print_json(&uploaded)?;
        } else {
            for document in &uploaded {
                println!("{}", document_line(document));
            }
        }
        match tracker.count(UploadStage::Failed) {
            0 => Ok(()),
            failed => Err(usage(format!("{failed} of {} upload(s) failed.", tracker.total()))),
        }
    }

    async fn search(&mut self, args: SearchArgs) -> Result<()> {
        let session = self.optional_session().await?;
        let folder = match args.folder.as_deref().map(str::trim) {
            None => FolderFilter::Any,
            Some(value) if value.eq_ignore_ascii_case("unfiled") => FolderFilter::Unfiled,
            Some(value) => FolderFilter::In(
                value
                    .parse::<FolderId>()
                    .map_err(|_| usage(format!("'{value}' is neither a folder id nor 'unfiled'.")))?,
            ),
        };
        let scope = match (args.scope, &session) {
            (ScopeArg::All, _) => Scope::Accessible,
            (ScopeArg::Public, _) => Scope::Public,
            (ScopeArg::Own, Some(session)) => Scope::Own(session.user_id()),
            (ScopeArg::Own, None) => return Err(ErrorKind::Library(LibraryErrorKind::NotSignedIn).into()),
        };
        let query = DocumentQuery {
            text: args.query,
            file_type: args.file_type,
            folder,
            tag: args.tag,
            ids: None,
            scope,
            sort: args.sort,
            limit: args.limit,
        };
        let found = documents::search(&self.ctx, session.as_ref(), query, args.favorites)
            .await
            .map_err(ErrorKind::library)?;
        if self.json {
            return print_json(&found);
        }
        if found.is_empty() {
            notify(Notice::info("No documents found."));
        }
        for document in &found {
            println!("{}", document_line(document));
        }
        Ok(())
    }

    async fn show(&mut self, id: DocumentId, text: bool) -> Result<()> {
        let session = self.optional_session().await?;
        let document = documents::get(&self.ctx, session.as_ref(), id).await.map_err(ErrorKind::library)?;
        let pages = self.page_count(session.as_ref(), &document).await;
        if self.json {
            return print_json(&json!({ "document": document, "pages": pages }));
        }
        let viewer = ViewerState::new(document.file_type, pages.unwrap_or(0));
        println!("{}", document.title);
        println!("id:       {}", document.id);
        println!("type:     {} ({})", document.file_type, document.mime_type.as_deref().unwrap_or("unknown"));
        println!("size:     {} bytes", document.file_size);
        println!("pages:    {}", viewer.page_count());
        println!("folder:   {}", document.folder_name.as_deref().unwrap_or("-"));
        println!("tags:     {}", document.tags);
        println!("public:   {}", if document.is_public { "yes" } else { "no" });
        println!("favorite: {}", if document.is_favorite { "yes" } else { "no" });
        println!("url:      {}", document.file_url);
        if text {
            println!();
            println!("{}", document.content);
        } else if !document.content.is_empty() {
            println!("excerpt:  {}", document.excerpt(EXCERPT_CHARS));
        }
        Ok(())
    }

    /// Page count of a PDF, read from its blob. Best effort: `None` when the
    /// blob can't be fetched.
    async fn page_count(&self, session: Option<&Session>, document: &Document) -> Option<usize> {
        if document.file_type != FileKind::Pdf {
            return Some(1);
        }
        let (bucket, path) = match &document.storage_path {
            Some(path) => (Bucket::Pdf, path.clone()),
            None => self.ctx.storage.locate(&document.file_url)?,
        };
        let token = session.map(|session| &session.access_token);
        match self.ctx.storage.download(token, bucket, &path).await {
            Ok(bytes) => Some(count_pdf_pages(&bytes)),
            Err(err) => {
                tracing::debug!(error = ?err, "Could not fetch document to count pages");
                None
            },
        }
    }

    async fn update(&mut self, args: UpdateArgs) -> Result<()> {
        let changes = DocumentChanges {
            title: args.title,
            tags: args.tags.as_deref().map(Tags::parse),
            is_public: match (args.public, args.private) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            folder_id: None,
        };
        if changes.is_empty() {
            return Err(usage("Nothing to update: pass --title, --tags, --public or --private."));
        }
        let session = self.sign_in().await?;
        let document = documents::update(&self.ctx, &session, args.id, changes)
            .await
            .map_err(ErrorKind::library)?;
        notify(Notice::success(format!("Updated \"{}\".", document.title)));
        Ok(())
    }

    async fn folders(&mut self, action: FolderAction) -> Result<()> {
        let session = self.sign_in().await?;
        match action {
            FolderAction::Tree => {
                let nodes = folders::tree(&self.ctx, &session).await.map_err(ErrorKind::library)?;
                let flat = tree::flatten(&nodes);
                if self.json {
                    let rows: Vec<_> =
                        flat.iter().map(|(depth, node)| json!({ "depth": depth, "folder": node.folder })).collect();
                    return print_json(&rows);
                }
                if flat.is_empty() {
                    notify(Notice::info("No folders yet."));
                }
                for (depth, node) in flat {
                    println!(
                        "{}{}  ({} documents)  {}",
                        "  ".repeat(depth),
                        node.name(),
                        node.folder.document_count,
                        node.id()
                    );
                }
            },
            FolderAction::Create { name, parent } => {
                let folder = folders::create(&self.ctx, &session, &name, parent).await.map_err(ErrorKind::library)?;
                notify(Notice::success(format!("Created folder \"{}\".", folder.name)));
                println!("{}", folder.id);
            },
            FolderAction::Rename { id, name } => {
                let nodes = folders::tree(&self.ctx, &session).await.map_err(ErrorKind::library)?;
                let current = tree::find(&nodes, id).ok_or_else(|| usage(format!("Folder {id} not found.")))?;
                let folder = folders::rename(&self.ctx, &session, &current.folder, &name)
                    .await
                    .map_err(ErrorKind::library)?;
                notify(Notice::success(format!("Renamed folder to \"{}\".", folder.name)));
            },
            FolderAction::Move { id, target } => {
                folders::move_to(&self.ctx, &session, id, target.folder())
                    .await
                    .map_err(ErrorKind::library)?;
                notify(Notice::success("Moved folder."));
            },
            FolderAction::Delete { id } => {
                folders::delete(&self.ctx, &session, id).await.map_err(ErrorKind::library)?;
                notify(Notice::success("Deleted folder."));
            },
        }
        Ok(())
    }

    async fn dashboard(&mut self) -> Result<()> {
        let session = self.sign_in().await?;
        let data = documents::dashboard(&self.ctx, &session).await.map_err(ErrorKind::library)?;
        if self.json {
            return print_json(&data);
        }
        println!("documents:  {} ({} PDF, {} image)", data.total_documents, data.pdf_count, data.image_count);
        println!("storage:    {} bytes", data.total_bytes);
        println!("favourites: {}", data.favorite_count);
        println!("folders:    {}", data.folder_count);
        if !data.recent_documents.is_empty() {
            println!();
            println!("Recent:");
            for document in &data.recent_documents {
                println!("  {}", document_line(document));
            }
        }
        Ok(())
    }
}

/// Display name of an upload source.
fn file_name_of(path: &Path) -> String {
    path.file_name().map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}
