//! Client for the backend-as-a-service that owns docshelf's data.
//!
//! Authentication, the document, folder, favourite and profile tables, and
//! the stored procedures are reached through four traits in [`backend`].
//! [`RestBackend`] speaks HTTP; `MockBackend` (behind the `mock` feature)
//! keeps everything in memory for tests.
//!
//! Row-level security lives on the server. This crate never filters rows by
//! owner on its own, except to build the explicit scope a search asks for.

mod auth;
pub mod backend;
pub mod error;
pub mod query;
mod request;
mod rows;

pub use crate::auth::{AuthUser, Session, SignUpOutcome, auth_message};
pub use crate::backend::{AuthService, Backend, DocumentStore, FolderStore, ProfileStore, RestBackend};
pub use crate::request::{
    DocumentChanges, DocumentQuery, FolderFilter, NewDocument, ProfileChanges, Scope, SortOrder,
};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn Backend + Send + Sync>;
