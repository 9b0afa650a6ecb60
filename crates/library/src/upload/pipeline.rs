use super::UploadRequest;
use super::progress::{UploadEvent, UploadId, UploadStage};
use crate::error::{ErrorKind, Result};
use crate::{Context, PathParameters};
use async_stream::stream;
use docshelf_client::{NewDocument, Session};
use docshelf_extract::{MediaType, extract_pdf_text, validate_upload};
use docshelf_model::{Document, FileKind};
use docshelf_storage::Bucket;
use exn::ResultExt;
use futures::stream::{FuturesUnordered, Stream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::instrument;

/// A stored document, plus anything that went wrong without stopping the
/// upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub document: Document,
    pub warnings: Vec<String>,
}

/// Announces stage changes of one upload, to the log and optionally to a
/// batch's event stream.
struct Reporter {
    id: UploadId,
    file_name: String,
    events: Option<UnboundedSender<UploadEvent>>,
}

impl Reporter {
    fn stage(&self, stage: UploadStage) {
        tracing::debug!(upload = %self.id, file = %self.file_name, %stage, "Upload stage");
        if let Some(events) = &self.events {
            // The receiving stream outlives every upload it drives.
            let _ = events.send(UploadEvent::Stage {
                id: self.id,
                file_name: self.file_name.clone(),
                stage,
            });
        }
    }
}

/// Upload one file and create its document.
pub async fn upload(ctx: &Context, session: &Session, request: UploadRequest) -> Result<Uploaded> {
    let reporter = Reporter {
        id: UploadId::new(),
        file_name: request.file_name.clone(),
        events: None,
    };
    run(ctx, session, request, &reporter).await
}

#[instrument(level = "debug", skip_all, fields(upload = %reporter.id, file = %reporter.file_name))]
async fn run(ctx: &Context, session: &Session, request: UploadRequest, reporter: &Reporter) -> Result<Uploaded> {
    reporter.stage(UploadStage::Validating);
    let media = validate_upload(
        &request.file_name,
        request.mime_type.as_deref(),
        &request.data,
        ctx.upload.max_size_bytes,
    )
    .map_err(ErrorKind::extract)?;
    let title = request.title();
    let stem = request.stem().to_string();
    let data = Arc::new(request.data);

    reporter.stage(UploadStage::Extracting);
    let mut warnings = Vec::new();
    let content = match extract_text(ctx, media, data.clone()).await {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(error = ?err, "Text extraction failed, storing without content");
            warnings.push(format!(
                "Could not extract text from {}: {err}. The document was saved without searchable text.",
                request.file_name
            ));
            String::new()
        },
    };

    reporter.stage(UploadStage::Uploading);
    let parameters = PathParameters {
        user: session.user_id(),
        millis: (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
        stem: &stem,
        kind: media.kind(),
    };
    let path = ctx.paths.generate_with_ext(&parameters, media.extension())?;
    let bucket = Bucket::for_kind(media.kind());
    let object = ctx
        .storage
        .upload(&session.access_token, bucket, &path, &data, media.mime())
        .await
        .map_err(ErrorKind::storage)?;

    reporter.stage(UploadStage::Saving);
    let row = NewDocument {
        user_id: session.user_id(),
        title,
        content,
        file_type: media.kind(),
        mime_type: media.mime().to_string(),
        file_size: data.len() as u64,
        file_url: object.public_url.clone(),
        storage_path: object.path.clone(),
        is_public: request.is_public,
        tags: request.tags,
        folder_id: request.folder_id,
    };
    let document = match ctx.backend.insert_document(session, &row).await {
        Ok(document) => document,
        Err(err) => {
            if let Err(cleanup) = ctx.storage.delete(&session.access_token, bucket, &object.path).await {
                tracing::warn!(%bucket, path = %object.path, error = ?cleanup, "Could not remove orphaned blob");
            }
            return Err(ErrorKind::backend(err));
        },
    };
    tracing::info!(document = %document.id, %bucket, path = %object.path, "Uploaded document");
    Ok(Uploaded { document, warnings })
}

/// Text for the search index: scraped from PDFs, recognised from images.
/// Both run on the blocking pool.
async fn extract_text(ctx: &Context, media: MediaType, data: Arc<Vec<u8>>) -> Result<String> {
    match media.kind() {
        FileKind::Pdf => tokio::task::spawn_blocking(move || extract_pdf_text(&data))
            .await
            .or_raise(|| ErrorKind::Task)?
            .map_err(ErrorKind::extract),
        FileKind::Image => {
            let recognizer = ctx.recognizer.clone();
            let language = ctx.ocr_language.clone();
            tokio::task::spawn_blocking(move || recognizer.recognize(&data, &language))
                .await
                .or_raise(|| ErrorKind::Task)?
                .map(|text| text.trim().to_string())
                .map_err(ErrorKind::ocr)
        },
    }
}

enum Next {
    Event(UploadEvent),
    Finished(UploadId, Result<Uploaded>),
    Idle,
}

/// Upload a batch, at most `upload.concurrency` files at a time.
///
/// The stream starts with [`Started`](UploadEvent::Started) and a
/// [`Queued`](UploadStage::Queued) stage per file, and ends with
/// [`Complete`](UploadEvent::Complete). In between, every upload reports its
/// own stages and finishes with exactly one
/// [`Done`](UploadEvent::Done) or [`Failed`](UploadEvent::Failed). A failed
/// upload never affects the others.
pub fn upload_all<'a>(
    ctx: &'a Context,
    session: &'a Session,
    requests: Vec<UploadRequest>,
) -> impl Stream<Item = UploadEvent> + 'a {
    stream! {
        yield UploadEvent::Started { total: requests.len() };
        let mut queue = VecDeque::with_capacity(requests.len());
        for request in requests {
            let id = UploadId::new();
            yield UploadEvent::Stage {
                id,
                file_name: request.file_name.clone(),
                stage: UploadStage::Queued,
            };
            queue.push_back((id, request));
        }

        let (sender, mut receiver) = unbounded_channel();
        let limit = ctx.upload.concurrency.max(1);
        let mut running = FuturesUnordered::new();
        let (mut succeeded, mut failed) = (0, 0);
        loop {
            while running.len() < limit {
                let Some((id, request)) = queue.pop_front() else {
                    break;
                };
                let reporter = Reporter {
                    id,
                    file_name: request.file_name.clone(),
                    events: Some(sender.clone()),
                };
                running.push(async move {
                    let result = run(ctx, session, request, &reporter).await;
                    (reporter.id, result)
                });
            }
            if running.is_empty() {
                break;
            }

            let next = tokio::select! {
                biased;
                Some(event) = receiver.recv() => Next::Event(event),
                Some((id, result)) = running.next() => Next::Finished(id, result),
                else => Next::Idle,
            };
            match next {
                Next::Event(event) => yield event,
                Next::Finished(id, result) => {
                    // Stages sent before completion go out first.
                    while let Ok(event) = receiver.try_recv() {
                        yield event;
                    }
                    match result {
                        Ok(uploaded) => {
                            succeeded += 1;
                            for message in uploaded.warnings {
                                yield UploadEvent::Warning { id, message };
                            }
                            yield UploadEvent::Done { id, document: Box::new(uploaded.document) };
                        },
                        Err(error) => {
                            failed += 1;
                            tracing::warn!(upload = %id, error = ?error, "Upload failed");
                            yield UploadEvent::Failed { id, error };
                        },
                    }
                },
                Next::Idle => break,
            }
        }
        tracing::info!(succeeded, failed, "Upload batch finished");
        yield UploadEvent::Complete { succeeded, failed };
    }
}
