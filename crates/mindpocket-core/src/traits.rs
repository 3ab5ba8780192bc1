//! Core traits for MindPocket abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// BOOKMARK REPOSITORY TRAITS
// =============================================================================

/// Repository for ingest records.
///
/// Status writes are guarded by [`IngestStatus::allowed_predecessors`]: each
/// returns `false` when the record was not in a state that may move to the
/// requested one, so terminal records are never rewritten.
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Insert a new record in `pending` state.
    async fn insert(&self, bookmark: NewBookmark) -> Result<()>;

    /// Fetch a record by id.
    async fn get(&self, id: Uuid) -> Result<Option<Bookmark>>;

    /// Store the blob location of an uploaded file (sets both `file_url` and `url`).
    async fn set_file_url(&self, id: Uuid, file_url: &str) -> Result<()>;

    /// Assign a folder if the record has none yet.
    async fn set_folder(&self, id: Uuid, folder_id: Uuid) -> Result<bool>;

    /// `pending → processing`.
    async fn mark_processing(&self, id: Uuid) -> Result<bool>;

    /// `processing → completed`, writing title, description and content.
    async fn complete(&self, id: Uuid, content: CompletedContent) -> Result<bool>;

    /// `pending|processing → failed`. The error is sanitized before storage.
    async fn fail(&self, id: Uuid, error: &str) -> Result<bool>;

    /// Newest-first history for one user.
    async fn history(&self, user_id: &str, query: HistoryQuery) -> Result<Vec<HistoryItem>>;

    /// Fail every non-terminal record last touched before `cutoff`.
    ///
    /// Returns the ids that were reconciled.
    async fn fail_stale(&self, cutoff: DateTime<Utc>, error: &str) -> Result<Vec<Uuid>>;
}

// =============================================================================
// FOLDER REPOSITORY TRAITS
// =============================================================================

/// Repository for user folders.
#[async_trait]
pub trait FolderRepository: Send + Sync {
    /// All folders of a user ordered by `sort_order`.
    async fn list(&self, user_id: &str) -> Result<Vec<Folder>>;

    /// Fetch one folder owned by the user.
    async fn get(&self, user_id: &str, id: Uuid) -> Result<Option<Folder>>;

    /// Create a folder at `max(sort_order) + 1` (0 for the first folder).
    async fn create(&self, folder: NewFolder) -> Result<Folder>;
}

// =============================================================================
// EMBEDDING REPOSITORY TRAITS
// =============================================================================

/// Repository for embedding storage.
#[async_trait]
pub trait EmbeddingRepository: Send + Sync {
    /// Delete existing embeddings for a bookmark, then insert `chunks`.
    async fn replace_for_bookmark(
        &self,
        bookmark_id: Uuid,
        chunks: Vec<(String, crate::Vector)>,
        model: &str,
    ) -> Result<()>;

    /// Get all embeddings for a bookmark ordered by chunk index.
    async fn get_for_bookmark(&self, bookmark_id: Uuid) -> Result<Vec<Embedding>>;

    /// Delete all embeddings for a bookmark.
    async fn delete_for_bookmark(&self, bookmark_id: Uuid) -> Result<()>;
}

// =============================================================================
// IDENTITY / PROVIDER REPOSITORY TRAITS
// =============================================================================

/// Lookup of per-user model providers.
#[async_trait]
pub trait ChatProviderRepository: Send + Sync {
    /// The user's default chat provider, if one is configured.
    async fn default_chat_provider(&self, user_id: &str) -> Result<Option<ChatProvider>>;
}

/// Resolution of API bearer tokens to users.
#[async_trait]
pub trait ApiTokenRepository: Send + Sync {
    /// Map a SHA-256 hex token hash to its owning user id.
    async fn resolve_user(&self, token_hash: &str) -> Result<Option<String>>;
}

// =============================================================================
// BLOB STORAGE TRAITS
// =============================================================================

/// Write-once object storage for uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes at `path` and return the public URL.
    async fn put(&self, path: &str, data: &[u8]) -> Result<String>;

    /// Read bytes stored at `path`.
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Check whether an object exists.
    async fn exists(&self, path: &str) -> Result<bool>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts, one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<crate::Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// A function the model may call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: JsonValue,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: JsonValue,
}

/// One message in a tool-calling conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatTurn {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

/// Model output for one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Chat backend with function calling.
#[async_trait]
pub trait ToolChatBackend: Send + Sync {
    /// Run one completion step over the conversation so far.
    async fn chat(&self, messages: &[ChatTurn], tools: &[ToolSpec]) -> Result<ChatReply>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
