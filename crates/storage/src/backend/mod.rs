//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, a unified interface over
//! the bucketed object storage of the backend-as-a-service, plus an HTTP
//! implementation and (behind the `mock` feature) an in-memory
//! implementation for tests.

mod http;
#[cfg(feature = "mock")]
mod mock;

pub use self::http::HttpBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::Bucket;
use crate::error::Result;
use async_trait::async_trait;
use docshelf_model::AccessToken;

/// An object that has been written to a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: Bucket,
    /// Normalized object path, relative to the bucket root.
    pub path: String,
    pub size: u64,
    pub content_type: String,
    /// Publicly reachable URL, as returned by
    /// [`public_url()`](StorageBackend::public_url).
    pub public_url: String,
}

/// Unified interface for blob storage.
///
/// All paths are relative to a bucket root and are validated with
/// [`validate_path`](crate::validate_path) before use. Implementations must
/// enforce this validation.
///
/// Uploads never overwrite: writing to an occupied path fails with
/// [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists).
///
/// # Examples
///
/// ```no_run
/// use docshelf_model::AccessToken;
/// use docshelf_storage::{Bucket, StorageBackend, error::Result};
///
/// async fn store_scan(backend: &dyn StorageBackend, token: &AccessToken, png: &[u8]) -> Result<String> {
///     let object = backend.upload(token, Bucket::Image, "user/scan.png", png, "image/png").await?;
///     Ok(object.public_url)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// Write a new object.
    async fn upload(
        &self,
        token: &AccessToken,
        bucket: Bucket,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<StoredObject>;

    /// Read an object's contents. Without a token, only public objects are
    /// reachable.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn download(&self, token: Option<&AccessToken>, bucket: Bucket, path: &str) -> Result<Vec<u8>>;

    /// Delete an object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn delete(&self, token: &AccessToken, bucket: Bucket, path: &str) -> Result<()>;

    /// The public URL of an object. Does not check that the object exists.
    fn public_url(&self, bucket: Bucket, path: &str) -> Result<String>;

    /// Inverse of [`public_url()`](Self::public_url): which bucket and path a
    /// public URL points at, if it belongs to this backend at all.
    fn locate(&self, public_url: &str) -> Option<(Bucket, String)>;
}
