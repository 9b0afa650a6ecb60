//! HTTP storage backend.
//!
//! Talks to the object storage API of the backend-as-a-service:
//!
//! - `POST   /storage/v1/object/<bucket>/<path>` uploads (never upserts),
//! - `GET    /storage/v1/object/<bucket>/<path>` downloads with a session,
//! - `GET    /storage/v1/object/public/<bucket>/<path>` serves public blobs,
//! - `DELETE /storage/v1/object/<bucket>` removes by prefix list.
//!
//! Every request carries the project's anonymous key in the `apikey` header;
//! authenticated requests add the user's access token as a bearer token.

use crate::{
    Bucket, BucketNames, StorageBackend, StoredObject,
    error::{ErrorKind, Result},
    validate_path,
};
use async_trait::async_trait;
use docshelf_model::AccessToken;
use exn::{OptionExt, ResultExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Upper bound on requests in flight against the storage API.
const DEFAULT_CONCURRENT_REQUESTS: usize = 8;

const OBJECT_SEGMENTS: [&str; 3] = ["storage", "v1", "object"];

/// HTTP storage backend.
///
/// # Examples
///
/// ```no_run
/// use docshelf_storage::{BucketNames, backend::HttpBackend};
///
/// # fn example() -> docshelf_storage::error::Result<()> {
/// let backend = HttpBackend::new(
///     "supabase",
///     "https://project.supabase.co",
///     "public-anon-key",
///     BucketNames::default(),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpBackend {
    name: String,
    client: Client,
    base: Url,
    anon_key: String,
    buckets: BucketNames,
    /// Rate limiter for concurrent storage requests.
    rate_limiter: Arc<Semaphore>,
}

impl HttpBackend {
    pub fn new(
        name: impl Into<String>,
        base_url: impl AsRef<str>,
        anon_key: impl Into<String>,
        buckets: BucketNames,
    ) -> Result<Self> {
        let base_url = base_url.as_ref();
        let base = Url::parse(base_url).or_raise(|| ErrorKind::Configuration(base_url.to_string()))?;
        if base.cannot_be_a_base() {
            exn::bail!(ErrorKind::Configuration(base_url.to_string()));
        }
        let anon_key = anon_key.into();
        if anon_key.trim().is_empty() {
            exn::bail!(ErrorKind::Configuration("anonymous key is empty".to_string()));
        }
        // No request timeout: large uploads may legitimately take minutes.
        let client = Client::builder()
            .user_agent(concat!("docshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Configuration("could not build HTTP client".to_string()))?;
        Ok(Self {
            name: name.into(),
            client,
            base,
            anon_key,
            buckets,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    /// `<base>/storage/v1/object[/<extra>...]/<bucket>[/<path>]`
    fn object_url(&self, extra: Option<&str>, bucket: Bucket, path: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .ok()
                .ok_or_raise(|| ErrorKind::Configuration(self.base.to_string()))?;
            segments.pop_if_empty().extend(OBJECT_SEGMENTS);
            segments.extend(extra);
            segments.push(self.buckets.name(bucket));
            if let Some(path) = path {
                segments.extend(path.split('/'));
            }
        }
        Ok(url)
    }

    fn request(&self, builder: RequestBuilder, token: Option<&AccessToken>) -> RequestBuilder {
        let builder = builder.header("apikey", &self.anon_key);
        match token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder.bearer_auth(&self.anon_key),
        }
    }

    /// Acquire a rate limiter permit before making a storage API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter.clone().acquire_owned().await.or_raise(|| ErrorKind::Network)
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Response> {
        let _permit = self.acquire_permit().await?;
        let response = builder.send().await.or_raise(|| ErrorKind::Network)?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        exn::bail!(error_for_status(status, &body, path))
    }
}

/// Error payload of the storage API. Some deployments report the logical
/// status inside the body (e.g. `"409"` on a `400` response).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "statusCode")]
    status_code: Option<serde_json::Value>,
    error: Option<String>,
    message: Option<String>,
}

fn error_for_status(status: StatusCode, body: &str, path: &str) -> ErrorKind {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let logical = parsed
        .status_code
        .as_ref()
        .and_then(|code| match code {
            serde_json::Value::String(code) => code.parse::<u16>().ok(),
            serde_json::Value::Number(code) => code.as_u64().and_then(|code| u16::try_from(code).ok()),
            _ => None,
        })
        .unwrap_or(status.as_u16());
    match logical {
        404 => ErrorKind::NotFound(path.to_string()),
        401 | 403 => ErrorKind::PermissionDenied(path.to_string()),
        409 => ErrorKind::AlreadyExists(path.to_string()),
        status => ErrorKind::BackendError {
            status,
            message: parsed.message.or(parsed.error).unwrap_or_else(|| body.trim().to_string()),
        },
    }
}

#[async_trait]
impl StorageBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(level = "debug", skip(self, token, data), fields(backend = %self.name, bytes = data.len()))]
    async fn upload(
        &self,
        token: &AccessToken,
        bucket: Bucket,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<StoredObject> {
        let path = validate_path(path)?;
        let url = self.object_url(None, bucket, Some(&path))?;
        let builder = self
            .client
            .post(url)
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(data.to_vec());
        self.send(self.request(builder, Some(token)), &path).await?;
        tracing::debug!(%bucket, %path, "Uploaded object");
        Ok(StoredObject {
            bucket,
            public_url: self.public_url(bucket, &path)?,
            path,
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    async fn download(&self, token: Option<&AccessToken>, bucket: Bucket, path: &str) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let url = match token {
            Some(_) => self.object_url(None, bucket, Some(&path))?,
            None => self.object_url(Some("public"), bucket, Some(&path))?,
        };
        let response = self.send(self.request(self.client.get(url), token), &path).await?;
        let bytes = response.bytes().await.or_raise(|| ErrorKind::Network)?;
        Ok(bytes.to_vec())
    }

    #[tracing::instrument(level = "debug", skip(self, token), fields(backend = %self.name))]
    async fn delete(&self, token: &AccessToken, bucket: Bucket, path: &str) -> Result<()> {
        let path = validate_path(path)?;
        let url = self.object_url(None, bucket, None)?;
        let builder = self.client.delete(url).json(&serde_json::json!({ "prefixes": [&path] }));
        let response = self.send(self.request(builder, Some(token)), &path).await?;
        // The API answers with the list of removed objects; nothing removed
        // means nothing was there.
        let removed: Vec<serde_json::Value> = response.json().await.or_raise(|| ErrorKind::Network)?;
        if removed.is_empty() {
            exn::bail!(ErrorKind::NotFound(path));
        }
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> Result<String> {
        let path = validate_path(path)?;
        Ok(self.object_url(Some("public"), bucket, Some(&path))?.to_string())
    }

    /// Paths are compared in their URL-encoded form. Object paths produced
    /// by the upload pipeline never need encoding.
    fn locate(&self, public_url: &str) -> Option<(Bucket, String)> {
        let url = Url::parse(public_url).ok()?;
        if url.origin() != self.base.origin() {
            return None;
        }
        let segments: Vec<&str> = url.path_segments()?.collect();
        let marker = [OBJECT_SEGMENTS[0], OBJECT_SEGMENTS[1], OBJECT_SEGMENTS[2], "public"];
        let start = segments.windows(marker.len()).position(|window| window == marker)? + marker.len();
        let (bucket, rest) = segments.get(start..)?.split_first()?;
        let bucket = self.buckets.resolve(bucket)?;
        let path = validate_path(rest.join("/")).ok()?;
        Some((bucket, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new("test", server.uri(), "anon", BucketNames::default()).unwrap()
    }

    fn token() -> AccessToken {
        AccessToken::new("user-jwt")
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(HttpBackend::new("x", "not a url", "anon", BucketNames::default()).is_err());
        assert!(HttpBackend::new("x", "https://example.com", " ", BucketNames::default()).is_err());
    }

    #[test]
    fn test_public_url_roundtrip() {
        let backend =
            HttpBackend::new("x", "https://project.supabase.co", "anon", BucketNames::default()).unwrap();
        let url = backend.public_url(Bucket::Pdf, "u1/1700000000000_invoice.pdf").unwrap();
        assert_eq!(
            url,
            "https://project.supabase.co/storage/v1/object/public/pdf-documents/u1/1700000000000_invoice.pdf"
        );
        assert_eq!(backend.locate(&url), Some((Bucket::Pdf, "u1/1700000000000_invoice.pdf".to_string())));
        assert_eq!(backend.locate("https://elsewhere.com/storage/v1/object/public/pdf-documents/a.pdf"), None);
        assert_eq!(
            backend.locate("https://project.supabase.co/storage/v1/object/public/avatars/a.png"),
            None
        );
    }

    #[tokio::test]
    async fn test_upload_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/image-documents/u1/scan.png"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer user-jwt"))
            .and(header("x-upsert", "false"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Key": "image-documents/u1/scan.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let stored = backend(&server)
            .upload(&token(), Bucket::Image, "/u1//scan.png", b"\x89PNG", "image/png")
            .await
            .unwrap();
        assert_eq!(stored.path, "u1/scan.png");
        assert_eq!(stored.size, 4);
        assert!(stored.public_url.ends_with("/storage/v1/object/public/image-documents/u1/scan.png"));
    }

    #[tokio::test]
    async fn test_upload_conflict_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "statusCode": "409",
                "error": "Duplicate",
                "message": "The resource already exists"
            })))
            .mount(&server)
            .await;

        let err = backend(&server)
            .upload(&token(), Bucket::Pdf, "u1/a.pdf", b"%PDF", "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(path) if path == "u1/a.pdf"));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .upload(&token(), Bucket::Pdf, "u1/a.pdf", b"%PDF", "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError { status: 503, message } if message == "maintenance"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_delete_by_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/storage/v1/object/pdf-documents"))
            .and(body_json(serde_json::json!({ "prefixes": ["u1/a.pdf"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "name": "u1/a.pdf" }])))
            .expect(1)
            .mount(&server)
            .await;

        backend(&server).delete(&token(), Bucket::Pdf, "u1/a.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let err = backend(&server).delete(&token(), Bucket::Pdf, "u1/gone.pdf").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_anonymous_download_uses_public_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/object/public/pdf-documents/u1/a.pdf"))
            .and(header("authorization", "Bearer anon"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/object/pdf-documents/u1/private.pdf"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let backend = backend(&server);
        assert_eq!(backend.download(None, Bucket::Pdf, "u1/a.pdf").await.unwrap(), b"%PDF-1.4");
        let err = backend.download(Some(&token()), Bucket::Pdf, "u1/private.pdf").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PermissionDenied(_)));
    }
}
