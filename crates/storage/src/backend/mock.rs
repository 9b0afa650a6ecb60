//! In-memory storage backend for testing.

use crate::error::{ErrorKind, Result};
use crate::{Bucket, StorageBackend, StoredObject, validate_path};
use async_trait::async_trait;
use docshelf_model::AccessToken;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

type Objects = HashMap<(Bucket, String), (String, Vec<u8>)>;

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Uploads
/// and deletes can be made to fail on demand to exercise error paths.
///
/// # Examples
///
/// ```
/// use docshelf_model::AccessToken;
/// use docshelf_storage::{Bucket, StorageBackend, backend::MockBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::default();
/// let token = AccessToken::new("test");
/// backend.upload(&token, Bucket::Pdf, "u1/a.pdf", b"%PDF", "application/pdf").await?;
/// assert!(backend.contains(Bucket::Pdf, "u1/a.pdf").await);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<Objects>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    ///
    /// Panics if any path fails validation. If test setup is wrong, then test
    /// should not pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (Bucket, impl AsRef<str>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (bucket, path, data) in objects {
            let Ok(validated) = validate_path(path.as_ref()) else {
                panic!("MockBackend::with_objects: invalid path {}", path.as_ref());
            };
            map.insert((bucket, validated), ("application/octet-stream".to_string(), data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every subsequent upload fail with a retryable backend error.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent delete fail with a retryable backend error.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, bucket: Bucket, path: &str) -> bool {
        match validate_path(path) {
            Ok(path) => self.storage.read().await.contains_key(&(bucket, path)),
            Err(_) => false,
        }
    }

    /// Number of stored objects across all buckets.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let objects: [(Bucket, &str, &[u8]); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(
        &self,
        _token: &AccessToken,
        bucket: Bucket,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<StoredObject> {
        let path = validate_path(path)?;
        if self.fail_uploads.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::BackendError {
                status: 503,
                message: "upload failure injected".to_string(),
            });
        }
        let mut guard = self.storage.write().await;
        if guard.contains_key(&(bucket, path.clone())) {
            exn::bail!(ErrorKind::AlreadyExists(path));
        }
        guard.insert((bucket, path.clone()), (content_type.to_string(), data.to_vec()));
        Ok(StoredObject {
            bucket,
            public_url: self.public_url(bucket, &path)?,
            path,
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    async fn download(&self, _token: Option<&AccessToken>, bucket: Bucket, path: &str) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        match guard.get(&(bucket, path.clone())) {
            Some((_, data)) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    async fn delete(&self, _token: &AccessToken, bucket: Bucket, path: &str) -> Result<()> {
        let path = validate_path(path)?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::BackendError {
                status: 503,
                message: "delete failure injected".to_string(),
            });
        }
        match self.storage.write().await.remove(&(bucket, path.clone())) {
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> Result<String> {
        Ok(format!("mock://{bucket}/{}", validate_path(path)?))
    }

    fn locate(&self, public_url: &str) -> Option<(Bucket, String)> {
        let rest = public_url.strip_prefix("mock://")?;
        let (bucket, path) = rest.split_once('/')?;
        let bucket = match bucket {
            "pdf" => Bucket::Pdf,
            "image" => Bucket::Image,
            _ => return None,
        };
        Some((bucket, validate_path(path).ok()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> AccessToken {
        AccessToken::new("test")
    }

    #[tokio::test]
    async fn test_upload_never_overwrites() {
        let backend = MockBackend::default();
        backend.upload(&token(), Bucket::Pdf, "u/a.pdf", b"one", "application/pdf").await.unwrap();
        let err = backend.upload(&token(), Bucket::Pdf, "u/./a.pdf", b"two", "application/pdf").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
        assert_eq!(backend.download(None, Bucket::Pdf, "u/a.pdf").await.unwrap(), b"one");
        // Same path in another bucket is a different object.
        backend.upload(&token(), Bucket::Image, "u/a.pdf", b"three", "image/png").await.unwrap();
        assert_eq!(backend.len().await, 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MockBackend::with_objects([(Bucket::Image, "u/scan.png", b"png".to_vec())]);
        backend.delete(&token(), Bucket::Image, "u/scan.png").await.unwrap();
        assert!(backend.is_empty().await);
        let err = backend.delete(&token(), Bucket::Image, "u/scan.png").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let backend = MockBackend::with_objects([(Bucket::Pdf, "u/a.pdf", b"x".to_vec())]);
        backend.fail_uploads(true);
        backend.fail_deletes(true);
        let err = backend.upload(&token(), Bucket::Pdf, "u/b.pdf", b"x", "application/pdf").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(backend.delete(&token(), Bucket::Pdf, "u/a.pdf").await.is_err());
        assert!(backend.contains(Bucket::Pdf, "u/a.pdf").await);
    }

    #[test]
    fn test_locate() {
        let backend = MockBackend::default();
        let url = backend.public_url(Bucket::Image, "u/scan.png").unwrap();
        assert_eq!(url, "mock://image/u/scan.png");
        assert_eq!(backend.locate(&url), Some((Bucket::Image, "u/scan.png".to_string())));
        assert_eq!(backend.locate("https://example.com/a.png"), None);
    }
}
