//! Document service.
//!
//! Thin orchestration over the backend: searches get their favourite
//! markers filled in, updates are validated before they leave the process,
//! and deleting a document also removes its blob.

use crate::error::{ErrorKind, Result};
use crate::{Context, ShareLink};
use docshelf_client::{DocumentChanges, DocumentQuery, Session};
use docshelf_model::{AccessLevel, DashboardData, Document, DocumentId, FolderId};
use docshelf_storage::Bucket;
use std::collections::HashSet;
use tracing::instrument;

async fn favorite_set(ctx: &Context, session: &Session) -> Result<HashSet<DocumentId>> {
    let ids = ctx.backend.favorite_ids(session).await.map_err(ErrorKind::backend)?;
    Ok(ids.into_iter().collect())
}

fn mark_favorites(documents: &mut [Document], favorites: &HashSet<DocumentId>) {
    for document in documents {
        document.is_favorite = favorites.contains(&document.id);
    }
}

/// Search documents visible to `session` (or public documents when signed
/// out). With `favorites_only`, results are narrowed to the user's
/// favourites.
#[instrument(level = "debug", skip(ctx, session))]
pub async fn search(
    ctx: &Context,
    session: Option<&Session>,
    mut query: DocumentQuery,
    favorites_only: bool,
) -> Result<Vec<Document>> {
    let favorites = match session {
        Some(session) => favorite_set(ctx, session).await?,
        None if favorites_only => exn::bail!(ErrorKind::NotSignedIn),
        None => HashSet::new(),
    };
    if favorites_only {
        let ids = match query.ids.take() {
            Some(ids) => ids.into_iter().filter(|id| favorites.contains(id)).collect(),
            None => favorites.iter().copied().collect::<Vec<_>>(),
        };
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        query.ids = Some(ids);
    }
    let mut documents = ctx.backend.search_documents(session, &query).await.map_err(ErrorKind::backend)?;
    mark_favorites(&mut documents, &favorites);
    tracing::debug!(found = documents.len(), "Searched documents");
    Ok(documents)
}

/// A single document. Public documents can be fetched without a session.
#[instrument(level = "debug", skip(ctx, session))]
pub async fn get(ctx: &Context, session: Option<&Session>, id: DocumentId) -> Result<Document> {
    let mut document = ctx.backend.get_document(session, id).await.map_err(ErrorKind::backend)?;
    if let Some(session) = session {
        document.is_favorite = favorite_set(ctx, session).await?.contains(&id);
    }
    Ok(document)
}

/// Update title, tags, visibility or folder. Titles are trimmed and must not
/// end up empty.
#[instrument(level = "debug", skip(ctx, session, changes))]
pub async fn update(ctx: &Context, session: &Session, id: DocumentId, mut changes: DocumentChanges) -> Result<Document> {
    if let Some(title) = changes.title.take() {
        let title = title.trim();
        if title.is_empty() {
            exn::bail!(ErrorKind::invalid("Title is required."));
        }
        changes.title = Some(title.to_string());
    }
    let document = ctx.backend.update_document(session, id, &changes).await.map_err(ErrorKind::backend)?;
    tracing::info!(document = %id, "Updated document");
    Ok(document)
}

/// Move documents into `folder`, or out of any folder with `None`. Returns
/// how many moved.
#[instrument(level = "debug", skip(ctx, session, ids), fields(count = ids.len()))]
pub async fn move_documents(
    ctx: &Context,
    session: &Session,
    ids: &[DocumentId],
    folder: Option<FolderId>,
) -> Result<usize> {
    let mut seen = HashSet::new();
    let ids: Vec<DocumentId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    if ids.is_empty() {
        return Ok(0);
    }
    let moved = ctx.backend.move_documents(session, &ids, folder).await.map_err(ErrorKind::backend)?;
    tracing::info!(moved, requested = ids.len(), folder = ?folder, "Moved documents");
    Ok(moved)
}

/// Where a document's blob lives: the recorded storage path if there is
/// one, otherwise whatever the public URL points at.
fn blob_location(ctx: &Context, document: &Document) -> Option<(Bucket, String)> {
    match &document.storage_path {
        Some(path) if !path.is_empty() => Some((Bucket::for_kind(document.file_type), path.clone())),
        _ => ctx.storage.locate(&document.file_url),
    }
}

/// Delete the row, then its blob. A blob that can't be removed is logged and
/// left behind; the document is gone either way.
#[instrument(level = "debug", skip(ctx, session))]
pub async fn delete(ctx: &Context, session: &Session, id: DocumentId) -> Result<Document> {
    let document = ctx.backend.delete_document(session, id).await.map_err(ErrorKind::backend)?;
    tracing::info!(document = %id, "Deleted document");
    match blob_location(ctx, &document) {
        Some((bucket, path)) => {
            if let Err(err) = ctx.storage.delete(&session.access_token, bucket, &path).await {
                tracing::warn!(%bucket, %path, error = ?err, "Could not delete document blob");
            }
        },
        None => tracing::warn!(url = %document.file_url, "Document blob location unknown, leaving it"),
    }
    Ok(document)
}

pub async fn add_favorite(ctx: &Context, session: &Session, id: DocumentId) -> Result<()> {
    ctx.backend.add_favorite(session, id).await.map_err(ErrorKind::backend)
}

pub async fn remove_favorite(ctx: &Context, session: &Session, id: DocumentId) -> Result<()> {
    ctx.backend.remove_favorite(session, id).await.map_err(ErrorKind::backend)
}

/// Flip the favourite marker, returning whether the document is now a
/// favourite.
#[instrument(level = "debug", skip(ctx, session))]
pub async fn toggle_favorite(ctx: &Context, session: &Session, id: DocumentId) -> Result<bool> {
    if favorite_set(ctx, session).await?.contains(&id) {
        remove_favorite(ctx, session, id).await?;
        Ok(false)
    } else {
        add_favorite(ctx, session, id).await?;
        Ok(true)
    }
}

/// The user's favourites, newest first.
pub async fn favorites(ctx: &Context, session: &Session) -> Result<Vec<Document>> {
    search(ctx, Some(session), DocumentQuery::default(), true).await
}

#[instrument(level = "debug", skip_all, fields(user = %session.user_id()))]
pub async fn dashboard(ctx: &Context, session: &Session) -> Result<DashboardData> {
    let mut data = ctx.backend.dashboard(session).await.map_err(ErrorKind::backend)?;
    let favorites = favorite_set(ctx, session).await?;
    mark_favorites(&mut data.recent_documents, &favorites);
    Ok(data)
}

/// A share link for a document the session can see. The token is never
/// stored or checked.
pub async fn share(ctx: &Context, session: Option<&Session>, id: DocumentId, access: AccessLevel) -> Result<String> {
    let document = ctx.backend.get_document(session, id).await.map_err(ErrorKind::backend)?;
    let link = ShareLink::new(document.id, access);
    tracing::debug!(document = %id, %access, "Created share link");
    Ok(ctx.share_url(&link))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestBed;
    use docshelf_client::error::ErrorKind as BackendErrorKind;
    use docshelf_client::{DocumentStore, FolderFilter, FolderStore, NewDocument, Scope};
    use docshelf_model::{FileKind, FolderName, Tags};
    use docshelf_storage::StorageBackend;

    async fn stored(bed: &TestBed, session: &Session, title: &str, content: &str, is_public: bool) -> Document {
        let path = format!("{}/{}.pdf", session.user_id(), title.to_lowercase());
        let object = bed
            .storage
            .upload(&session.access_token, Bucket::Pdf, &path, b"%PDF-1.4", "application/pdf")
            .await
            .unwrap();
        let document = NewDocument {
            user_id: session.user_id(),
            title: title.to_string(),
            content: content.to_string(),
            file_type: FileKind::Pdf,
            mime_type: "application/pdf".to_string(),
            file_size: 8,
            file_url: object.public_url,
            storage_path: object.path,
            is_public,
            tags: Tags::parse("tax"),
            folder_id: None,
        };
        bed.backend.insert_document(session, &document).await.unwrap()
    }

    #[tokio::test]
    async fn test_search_marks_favorites() {
        let bed = TestBed::new();
        let ada = bed.session("ada@example.com").await;
        let lease = stored(&bed, &ada, "Lease", "rental agreement", false).await;
        let invoice = stored(&bed, &ada, "Invoice", "amount due", false).await;
        assert!(toggle_favorite(&bed.ctx, &ada, lease.id).await.unwrap());

        let all = search(&bed.ctx, Some(&ada), DocumentQuery::default(), false).await.unwrap();
        let marked: Vec<(&str, bool)> = all.iter().map(|doc| (doc.title.as_str(), doc.is_favorite)).collect();
        assert_eq!(marked, [("Invoice", false), ("Lease", true)]);

        let only = favorites(&bed.ctx, &ada).await.unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].id, lease.id);

        let query = DocumentQuery {
            ids: Some(vec![invoice.id]),
            ..Default::default()
        };
        assert!(search(&bed.ctx, Some(&ada), query, true).await.unwrap().is_empty());

        assert!(!toggle_favorite(&bed.ctx, &ada, lease.id).await.unwrap());
        assert!(favorites(&bed.ctx, &ada).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_access() {
        let bed = TestBed::new();
        let ada = bed.session("ada@example.com").await;
        let public = stored(&bed, &ada, "Manual", "user guide", true).await;
        let private = stored(&bed, &ada, "Diary", "secret", false).await;

        let found = search(&bed.ctx, None, DocumentQuery::default(), false).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(get(&bed.ctx, None, public.id).await.unwrap().title, "Manual");
        let err = get(&bed.ctx, None, private.id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Backend(BackendErrorKind::NotFound(_))));

        let err = search(&bed.ctx, None, DocumentQuery::default(), true).await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::NotSignedIn);
    }

    #[tokio::test]
    async fn test_search_filters() {
        let bed = TestBed::new();
        let ada = bed.session("ada@example.com").await;
        let grace = bed.session("grace@example.com").await;
        stored(&bed, &ada, "Lease", "rental agreement", true).await;
        stored(&bed, &grace, "Thesis", "compiler rental notes", true).await;

        let query = DocumentQuery {
            text: Some("rental".to_string()),
            scope: Scope::Own(ada.user_id()),
            folder: FolderFilter::Unfiled,
            ..Default::default()
        };
        let found = search(&bed.ctx, Some(&ada), query, false).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Lease");
    }

    #[tokio::test]
    async fn test_update_validates_title() {
        let bed = TestBed::new();
        let ada = bed.session("ada@example.com").await;
        let lease = stored(&bed, &ada, "Lease", "", false).await;

        let changes = DocumentChanges {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        let err = update(&bed.ctx, &ada, lease.id, changes).await.unwrap_err();
        assert_eq!(err.to_string(), "Title is required.");

        let changes = DocumentChanges {
            title: Some("  Flat lease ".to_string()),
            is_public: Some(true),
            ..Default::default()
        };
        let updated = update(&bed.ctx, &ada, lease.id, changes).await.unwrap();
        assert_eq!(updated.title, "Flat lease");
        assert!(updated.is_public);
    }

    #[tokio::test]
    async fn test_move_dedupes() {
        let bed = TestBed::new();
        let ada = bed.session("ada@example.com").await;
        let lease = stored(&bed, &ada, "Lease", "", false).await;
        let folder = bed
            .backend
            .create_folder(&ada, &FolderName::new("Housing").unwrap(), None)
            .await
            .unwrap();

        assert_eq!(move_documents(&bed.ctx, &ada, &[], Some(folder.id)).await.unwrap(), 0);
        let moved = move_documents(&bed.ctx, &ada, &[lease.id, lease.id], Some(folder.id)).await.unwrap();
        assert_eq!(moved, 1);
        let document = get(&bed.ctx, Some(&ada), lease.id).await.unwrap();
        assert_eq!(document.folder_name.as_deref(), Some("Housing"));
    }

    #[tokio::test]
    async fn test_delete_removes_blob() {
        let bed = TestBed::new();
        let ada = bed.session("ada@example.com").await;
        let lease = stored(&bed, &ada, "Lease", "", false).await;
        let path = lease.storage_path.clone().unwrap();
        assert!(bed.storage.contains(Bucket::Pdf, &path).await);

        delete(&bed.ctx, &ada, lease.id).await.unwrap();
        assert!(!bed.storage.contains(Bucket::Pdf, &path).await);
        assert_eq!(bed.backend.document_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_survives_blob_failure() {
        let bed = TestBed::new();
        let ada = bed.session("ada@example.com").await;
        let lease = stored(&bed, &ada, "Lease", "", false).await;
        bed.storage.fail_deletes(true);

        delete(&bed.ctx, &ada, lease.id).await.unwrap();
        assert_eq!(bed.backend.document_count().await, 0);
        assert_eq!(bed.storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_share_and_dashboard() {
        let bed = TestBed::new();
        let ada = bed.session("ada@example.com").await;
        let lease = stored(&bed, &ada, "Lease", "", false).await;
        add_favorite(&bed.ctx, &ada, lease.id).await.unwrap();

        let url = share(&bed.ctx, Some(&ada), lease.id, AccessLevel::Comment).await.unwrap();
        let link = ShareLink::parse(&url).unwrap();
        assert_eq!((link.document, link.access), (lease.id, AccessLevel::Comment));
        assert!(url.starts_with("http://localhost:5173/share/"));

        let data = dashboard(&bed.ctx, &ada).await.unwrap();
        assert_eq!((data.total_documents, data.favorite_count), (1, 1));
        assert!(data.recent_documents[0].is_favorite);
    }
}
