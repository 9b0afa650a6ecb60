//! Application services for docshelf.
//!
//! Everything a front end needs, minus the front end: session and preference
//! state ([`AppState`]), the folder service ([`folders`]), the upload pipeline
//! ([`upload`]), the document service ([`documents`]), share links, routes,
//! viewer state and notices.
//!
//! Services are free functions over a [`Context`] (the collaborators and
//! settings) and a [`Session`](docshelf_client::Session) (who is acting).
//! Nothing here is global; whoever owns the `Context` and `AppState` decides
//! their lifetime.

pub mod documents;
pub mod error;
pub mod folders;
mod notice;
mod route;
mod share;
mod state;
mod template;
#[cfg(test)]
mod testing;
pub mod upload;
mod viewer;

pub use crate::notice::{Level, Notice, Notices};
pub use crate::route::{Resolved, Route};
pub use crate::share::{ShareLink, TOKEN_LENGTH};
pub use crate::state::{AppState, AuthState, RoleState, ThemeState};
pub use crate::template::{PathGenerator, PathParameters};
pub use crate::viewer::{MAX_ZOOM, MIN_ZOOM, ViewerState, ZOOM_STEP};
use crate::error::Result;
use docshelf_client::BackendHandle;
use docshelf_config::{Config, UploadConfig};
use docshelf_ocr::{DEFAULT_LANGUAGE, TextRecognizer};
use docshelf_storage::StorageHandle;
use std::sync::Arc;

pub type RecognizerHandle = Arc<dyn TextRecognizer>;

/// Collaborators and settings shared by every service call.
pub struct Context {
    pub backend: BackendHandle,
    pub storage: StorageHandle,
    pub recognizer: RecognizerHandle,
    pub paths: PathGenerator,
    pub upload: UploadConfig,
    pub share_origin: String,
    pub ocr_language: String,
}

impl Context {
    /// A context with default settings.
    pub fn new(backend: BackendHandle, storage: StorageHandle, recognizer: RecognizerHandle) -> Result<Self> {
        Self::from_config(&Config::default(), backend, storage, recognizer)
    }

    pub fn from_config(
        config: &Config,
        backend: BackendHandle,
        storage: StorageHandle,
        recognizer: RecognizerHandle,
    ) -> Result<Self> {
        let language = config.ocr.language.trim();
        Ok(Self {
            backend,
            storage,
            recognizer,
            paths: config.upload.path_template.parse()?,
            upload: config.upload.clone(),
            share_origin: config.share.origin.clone(),
            ocr_language: if language.is_empty() { DEFAULT_LANGUAGE } else { language }.to_string(),
        })
    }

    /// Full share link URL under the configured origin.
    pub fn share_url(&self, link: &ShareLink) -> String {
        link.to_url(&self.share_origin)
    }
}
