//! Ingestion orchestrator.
//!
//! Each admission path validates its input, inserts a `pending` bookmark and
//! hands the rest to a supervised background task:
//!
//! ```text
//! admit ──► pending ──► (auto folder) ──► processing ──► convert ─┬─► completed ──► embeddings
//!                                                                 └─► failed
//! ```
//!
//! The caller gets the bookmark id before any conversion I/O happens. If the
//! background task panics, the supervisor marks the record failed; anything
//! else left behind is reconciled by the sweep worker.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use mindpocket_core::defaults::{ALLOWED_EXTENSIONS, CHUNK_SIZE, MAX_FILE_SIZE};
use mindpocket_core::{
    BlobStore, BookmarkRepository, BookmarkType, ClientSource, CompletedContent, ConversionResult,
    EmbeddingBackend, EmbeddingRepository, Error, IngestAck, IngestStatus, NewBookmark, Result,
    SourceType,
};

use crate::auto_folder::{AutoFolderResolver, FolderResolveRequest};
use crate::chunking::chunk_paragraphs;
use crate::classify::{file_extension, infer_type_from_extension, infer_type_from_url};
use crate::converters::ConversionEngine;
use crate::description::extract_description;
use crate::platform::classify;

const EMPTY_RESULT: &str = "Conversion returned empty result";
const EMPTY_HTML_RESULT: &str = "HTML conversion returned empty result";
const TASK_ABORTED: &str = "Ingestion task aborted";

// =============================================================================
// REQUESTS
// =============================================================================

/// Submit a URL for server-side fetching.
#[derive(Debug, Clone)]
pub struct IngestUrlRequest {
    pub user_id: String,
    pub url: String,
    pub folder_id: Option<String>,
    pub title: Option<String>,
    pub client_source: ClientSource,
}

/// Submit an uploaded file.
#[derive(Debug, Clone)]
pub struct IngestFileRequest {
    pub user_id: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub folder_id: Option<String>,
    pub title: Option<String>,
    pub client_source: ClientSource,
}

/// Submit an HTML snapshot captured by the browser extension.
#[derive(Debug, Clone)]
pub struct IngestExtensionRequest {
    pub user_id: String,
    pub url: String,
    pub html: String,
    pub folder_id: Option<String>,
    pub title: Option<String>,
    pub client_source: ClientSource,
}

// =============================================================================
// BACKGROUND JOB
// =============================================================================

enum ConversionInput {
    Url(String),
    File { bytes: Vec<u8>, extension: String },
    Html { html: String, url: String },
}

impl ConversionInput {
    fn empty_message(&self) -> &'static str {
        match self {
            ConversionInput::Html { .. } => EMPTY_HTML_RESULT,
            _ => EMPTY_RESULT,
        }
    }
}

struct IngestJob {
    bookmark_id: Uuid,
    user_id: String,
    source_type: SourceType,
    folder_requested: bool,
    user_title: Option<String>,
    fallback_title: String,
    url: Option<String>,
    file_name: Option<String>,
    input: ConversionInput,
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Admission and background processing of ingestions.
///
/// Cheap to clone; all dependencies are shared.
#[derive(Clone)]
pub struct IngestPipeline {
    bookmarks: Arc<dyn BookmarkRepository>,
    embeddings: Arc<dyn EmbeddingRepository>,
    blobs: Arc<dyn BlobStore>,
    engine: Arc<ConversionEngine>,
    embedder: Arc<dyn EmbeddingBackend>,
    auto_folder: Option<Arc<AutoFolderResolver>>,
}

impl IngestPipeline {
    pub fn new(
        bookmarks: Arc<dyn BookmarkRepository>,
        embeddings: Arc<dyn EmbeddingRepository>,
        blobs: Arc<dyn BlobStore>,
        engine: Arc<ConversionEngine>,
        embedder: Arc<dyn EmbeddingBackend>,
    ) -> Self {
        Self {
            bookmarks,
            embeddings,
            blobs,
            engine,
            embedder,
            auto_folder: None,
        }
    }

    /// Enable auto-folder resolution for submissions without a folder.
    pub fn with_auto_folder(mut self, resolver: Arc<AutoFolderResolver>) -> Self {
        self.auto_folder = Some(resolver);
        self
    }

    pub async fn ingest_from_url(&self, request: IngestUrlRequest) -> Result<IngestAck> {
        validate_url(&request.url)?;
        let folder_id = parse_folder_id(request.folder_id.as_deref())?;
        let user_title = non_blank(request.title);
        let bookmark_type = infer_type_from_url(&request.url);
        let title = user_title.clone().unwrap_or_else(|| request.url.clone());

        let id = Uuid::now_v7();
        self.bookmarks
            .insert(NewBookmark {
                id,
                user_id: request.user_id.clone(),
                folder_id,
                bookmark_type,
                title: title.clone(),
                url: Some(request.url.clone()),
                source_type: SourceType::Url,
                client_source: request.client_source,
                platform: classify(&request.url),
                file_extension: None,
                file_size: None,
            })
            .await?;

        info!(
            subsystem = "ingest",
            component = "pipeline",
            op = "ingest_url",
            bookmark_id = %id,
            user_id = %request.user_id,
            url = %request.url,
            "Ingestion admitted"
        );

        self.spawn(IngestJob {
            bookmark_id: id,
            user_id: request.user_id,
            source_type: SourceType::Url,
            folder_requested: folder_id.is_some(),
            user_title,
            fallback_title: request.url.clone(),
            url: Some(request.url.clone()),
            file_name: None,
            input: ConversionInput::Url(request.url),
        });

        Ok(pending_ack(id, title, bookmark_type))
    }

    /// Validation runs before any record or blob is created.
    pub async fn ingest_from_file(&self, request: IngestFileRequest) -> Result<IngestAck> {
        let file_name = clean_file_name(&request.file_name)?;
        if request.bytes.len() as u64 > MAX_FILE_SIZE {
            return Err(Error::InvalidInput("File size exceeds 50MB limit".to_string()));
        }
        let extension = file_extension(&file_name);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(Error::InvalidInput(format!("Unsupported file type: {}", extension)));
        }
        let folder_id = parse_folder_id(request.folder_id.as_deref())?;

        let user_title = non_blank(request.title);
        let bookmark_type = infer_type_from_extension(&extension);
        let title = user_title.clone().unwrap_or_else(|| file_name.clone());

        let id = Uuid::now_v7();
        self.bookmarks
            .insert(NewBookmark {
                id,
                user_id: request.user_id.clone(),
                folder_id,
                bookmark_type,
                title: title.clone(),
                url: None,
                source_type: SourceType::File,
                client_source: request.client_source,
                platform: None,
                file_extension: Some(extension.clone()),
                file_size: Some(request.bytes.len() as i64),
            })
            .await?;

        let file_url = match self.store_blob(id, &file_name, &request.bytes).await {
            Ok(url) => url,
            Err(e) => {
                self.record_failure(id, &e.to_string()).await;
                return Err(e);
            }
        };

        info!(
            subsystem = "ingest",
            component = "pipeline",
            op = "ingest_file",
            bookmark_id = %id,
            user_id = %request.user_id,
            extension = %extension,
            file_size = request.bytes.len(),
            "Ingestion admitted"
        );

        self.spawn(IngestJob {
            bookmark_id: id,
            user_id: request.user_id,
            source_type: SourceType::File,
            folder_requested: folder_id.is_some(),
            user_title,
            fallback_title: file_name.clone(),
            url: Some(file_url),
            file_name: Some(file_name),
            input: ConversionInput::File {
                bytes: request.bytes,
                extension,
            },
        });

        Ok(pending_ack(id, title, bookmark_type))
    }

    pub async fn ingest_from_extension(&self, request: IngestExtensionRequest) -> Result<IngestAck> {
        validate_url(&request.url)?;
        if request.html.trim().is_empty() {
            return Err(Error::InvalidInput("HTML content is required".to_string()));
        }
        let folder_id = parse_folder_id(request.folder_id.as_deref())?;
        let user_title = non_blank(request.title);
        let title = user_title.clone().unwrap_or_else(|| request.url.clone());

        let id = Uuid::now_v7();
        self.bookmarks
            .insert(NewBookmark {
                id,
                user_id: request.user_id.clone(),
                folder_id,
                bookmark_type: BookmarkType::Article,
                title: title.clone(),
                url: Some(request.url.clone()),
                source_type: SourceType::Extension,
                client_source: request.client_source,
                platform: classify(&request.url),
                file_extension: None,
                file_size: None,
            })
            .await?;

        info!(
            subsystem = "ingest",
            component = "pipeline",
            op = "ingest_extension",
            bookmark_id = %id,
            user_id = %request.user_id,
            url = %request.url,
            html_bytes = request.html.len(),
            "Ingestion admitted"
        );

        self.spawn(IngestJob {
            bookmark_id: id,
            user_id: request.user_id,
            source_type: SourceType::Extension,
            folder_requested: folder_id.is_some(),
            user_title,
            fallback_title: request.url.clone(),
            url: Some(request.url.clone()),
            file_name: None,
            input: ConversionInput::Html {
                html: request.html,
                url: request.url,
            },
        });

        Ok(pending_ack(id, title, BookmarkType::Article))
    }

    /// Replace a bookmark's embeddings with freshly generated ones.
    ///
    /// Returns the number of chunks stored.
    pub async fn regenerate_embeddings(&self, bookmark_id: Uuid, content: &str) -> Result<usize> {
        let chunks = chunk_paragraphs(content, CHUNK_SIZE);
        if chunks.is_empty() {
            self.embeddings.delete_for_bookmark(bookmark_id).await?;
            return Ok(0);
        }

        let vectors = self.embedder.embed_texts(&chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "Expected {} vectors, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let count = chunks.len();
        self.embeddings
            .replace_for_bookmark(
                bookmark_id,
                chunks.into_iter().zip(vectors).collect(),
                self.embedder.model_name(),
            )
            .await?;
        Ok(count)
    }

    async fn store_blob(&self, id: Uuid, file_name: &str, bytes: &[u8]) -> Result<String> {
        let path = format!("ingest/{}/{}", id, file_name);
        let file_url = self.blobs.put(&path, bytes).await?;
        self.bookmarks.set_file_url(id, &file_url).await?;
        Ok(file_url)
    }

    /// Run the job on its own task, failing the record if that task dies.
    fn spawn(&self, job: IngestJob) {
        let bookmark_id = job.bookmark_id;
        let bookmarks = self.bookmarks.clone();
        let pipeline = self.clone();

        tokio::spawn(async move {
            let worker: JoinHandle<()> = tokio::spawn(async move { pipeline.process(job).await });
            if let Err(e) = worker.await {
                error!(
                    subsystem = "ingest",
                    component = "pipeline",
                    bookmark_id = %bookmark_id,
                    error = %e,
                    "Ingestion task aborted"
                );
                if let Err(e) = bookmarks.fail(bookmark_id, TASK_ABORTED).await {
                    error!(
                        subsystem = "ingest",
                        component = "pipeline",
                        bookmark_id = %bookmark_id,
                        error = %e,
                        "Failed to record aborted ingestion"
                    );
                }
            }
        });
    }

    async fn process(self, job: IngestJob) {
        let start = Instant::now();
        let id = job.bookmark_id;

        if !job.folder_requested {
            self.assign_folder(&job).await;
        }

        match self.bookmarks.mark_processing(id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    subsystem = "ingest",
                    component = "pipeline",
                    bookmark_id = %id,
                    "Bookmark no longer pending, skipping"
                );
                return;
            }
            Err(e) => {
                self.record_failure(id, &e.to_string()).await;
                return;
            }
        }

        let empty_message = job.input.empty_message();
        let outcome = match job.input {
            ConversionInput::Url(url) => self.engine.convert_from_url(&url).await,
            ConversionInput::File { bytes, extension } => {
                self.engine.convert_from_buffer(bytes, &extension).await
            }
            ConversionInput::Html { html, url } => {
                let engine = self.engine.clone();
                tokio::task::spawn_blocking(move || engine.convert_from_html(&html, &url))
                    .await
                    .map_err(|e| Error::Internal(format!("HTML conversion task failed: {}", e)))
            }
        };

        match outcome {
            Ok(Some(result)) if result.is_usable() => {
                self.finish(
                    id,
                    result,
                    job.user_title,
                    job.fallback_title,
                    job.source_type,
                    start,
                )
                .await;
            }
            Ok(_) => self.record_failure(id, empty_message).await,
            Err(e) => self.record_failure(id, &e.to_string()).await,
        }
    }

    async fn finish(
        &self,
        id: Uuid,
        result: ConversionResult,
        user_title: Option<String>,
        fallback_title: String,
        source_type: SourceType,
        start: Instant,
    ) {
        let title = user_title
            .or(result.title)
            .or_else(|| non_blank(Some(fallback_title)))
            .unwrap_or_else(|| "Untitled".to_string());
        let description = extract_description(&result.markdown);
        let content = result.markdown;

        let completed = CompletedContent {
            title,
            description,
            content: content.clone(),
        };
        match self.bookmarks.complete(id, completed).await {
            Ok(true) => {
                info!(
                    subsystem = "ingest",
                    component = "pipeline",
                    op = "complete",
                    bookmark_id = %id,
                    source_type = %source_type,
                    content_chars = content.chars().count(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Ingestion completed"
                );
                self.spawn_embeddings(id, content);
            }
            Ok(false) => {
                warn!(
                    subsystem = "ingest",
                    component = "pipeline",
                    bookmark_id = %id,
                    "Bookmark left processing before completion"
                );
            }
            Err(e) => self.record_failure(id, &e.to_string()).await,
        }
    }

    fn spawn_embeddings(&self, id: Uuid, content: String) {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            match pipeline.regenerate_embeddings(id, &content).await {
                Ok(chunk_count) => {
                    debug!(
                        subsystem = "ingest",
                        component = "pipeline",
                        op = "embed",
                        bookmark_id = %id,
                        chunk_count,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Embeddings regenerated"
                    );
                }
                Err(e) => {
                    warn!(
                        subsystem = "ingest",
                        component = "pipeline",
                        op = "embed",
                        bookmark_id = %id,
                        error = %e,
                        "Embedding generation failed"
                    );
                }
            }
        });
    }

    async fn assign_folder(&self, job: &IngestJob) {
        let Some(resolver) = &self.auto_folder else {
            return;
        };
        let request = FolderResolveRequest {
            user_id: job.user_id.clone(),
            source_type: job.source_type,
            url: job.url.clone(),
            title: job.user_title.clone(),
            file_name: job.file_name.clone(),
        };
        let Some(raw) = resolver.resolve(&request).await else {
            return;
        };
        let Ok(folder_id) = Uuid::parse_str(raw.trim()) else {
            warn!(
                subsystem = "ingest",
                component = "pipeline",
                bookmark_id = %job.bookmark_id,
                folder_id = %raw,
                "Resolved folder id is not a UUID"
            );
            return;
        };

        let owned = match resolver.folders().get(&job.user_id, folder_id).await {
            Ok(folder) => folder.is_some(),
            Err(e) => {
                warn!(
                    subsystem = "ingest",
                    component = "pipeline",
                    bookmark_id = %job.bookmark_id,
                    error = %e,
                    "Folder lookup failed"
                );
                return;
            }
        };
        if !owned {
            warn!(
                subsystem = "ingest",
                component = "pipeline",
                bookmark_id = %job.bookmark_id,
                folder_id = %folder_id,
                "Resolved folder does not belong to user"
            );
            return;
        }

        match self.bookmarks.set_folder(job.bookmark_id, folder_id).await {
            Ok(assigned) => debug!(
                subsystem = "ingest",
                component = "pipeline",
                bookmark_id = %job.bookmark_id,
                folder_id = %folder_id,
                assigned,
                "Folder assignment applied"
            ),
            Err(e) => warn!(
                subsystem = "ingest",
                component = "pipeline",
                bookmark_id = %job.bookmark_id,
                error = %e,
                "Folder assignment failed"
            ),
        }
    }

    async fn record_failure(&self, id: Uuid, message: &str) {
        warn!(
            subsystem = "ingest",
            component = "pipeline",
            bookmark_id = %id,
            error = %message,
            "Ingestion failed"
        );
        if let Err(e) = self.bookmarks.fail(id, message).await {
            error!(
                subsystem = "ingest",
                component = "pipeline",
                bookmark_id = %id,
                error = %e,
                "Failed to record ingestion failure"
            );
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn pending_ack(bookmark_id: Uuid, title: String, bookmark_type: BookmarkType) -> IngestAck {
    IngestAck {
        bookmark_id,
        title,
        markdown: None,
        bookmark_type,
        status: IngestStatus::Pending,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reduce a client-supplied file name to its last path component.
fn clean_file_name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("No file provided".to_string()));
    }
    let base = trimmed.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base.chars().all(|c| c == '.') || base.contains('\0') {
        return Err(Error::InvalidInput(format!("Invalid file name: {}", trimmed)));
    }
    Ok(base.to_string())
}

fn validate_url(raw: &str) -> Result<()> {
    let parsed =
        Url::parse(raw.trim()).map_err(|_| Error::InvalidInput(format!("Invalid URL: {}", raw)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(()),
        _ => Err(Error::InvalidInput(format!("Invalid URL: {}", raw))),
    }
}

fn parse_folder_id(raw: Option<&str>) -> Result<Option<Uuid>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(|_| Error::InvalidInput(format!("Invalid folder id: {}", s))),
    }
}
