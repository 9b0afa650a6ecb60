//! Blob storage for uploaded documents.
//!
//! The backend-as-a-service owns the buckets; this crate only chooses the
//! bucket for a file, validates object paths, and talks to the storage API
//! through the [`StorageBackend`] trait.

pub mod backend;
mod bucket;
pub mod error;
mod path;

pub use crate::backend::{StorageBackend, StoredObject};
pub use crate::bucket::{Bucket, BucketNames};
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type StorageHandle = Arc<dyn StorageBackend + Send + Sync>;
