//! In-memory implementations of every repository trait.
//!
//! Used by pipeline and API tests, and handy for running the service locally
//! without Postgres. State transitions follow the same guards as the
//! PostgreSQL repositories.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use tokio::sync::RwLock;
use uuid::Uuid;

use mindpocket_core::{
    sanitize_ingest_error, ApiTokenRepository, BlobStore, Bookmark, BookmarkRepository,
    ChatProvider, ChatProviderRepository, CompletedContent, Embedding, EmbeddingRepository, Error,
    Folder, FolderRepository, HistoryItem, HistoryQuery, IngestStatus, NewBookmark, NewFolder,
    Result,
};

#[derive(Default)]
struct State {
    bookmarks: HashMap<Uuid, Bookmark>,
    folders: Vec<Folder>,
    embeddings: Vec<Embedding>,
    providers: HashMap<String, ChatProvider>,
    tokens: HashMap<String, String>,
    blobs: HashMap<String, Vec<u8>>,
}

/// Shared in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a default chat provider for a user.
    pub async fn add_chat_provider(&self, provider: ChatProvider) {
        let mut state = self.state.write().await;
        state.providers.insert(provider.user_id.clone(), provider);
    }

    /// Register an API token hash for a user.
    pub async fn add_api_token(&self, token_hash: impl Into<String>, user_id: impl Into<String>) {
        let mut state = self.state.write().await;
        state.tokens.insert(token_hash.into(), user_id.into());
    }

    /// Number of bookmarks across all users.
    pub async fn bookmark_count(&self) -> usize {
        self.state.read().await.bookmarks.len()
    }

    /// Number of stored blobs.
    pub async fn blob_count(&self) -> usize {
        self.state.read().await.blobs.len()
    }

    /// Overwrite `updated_at`, used to age records in sweep tests.
    pub async fn touch(&self, id: Uuid, updated_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        let bookmark = state
            .bookmarks
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("bookmark {}", id)))?;
        bookmark.updated_at = updated_at;
        Ok(())
    }

    fn transition(
        bookmark: &mut Bookmark,
        next: IngestStatus,
    ) -> bool {
        if !bookmark.ingest_status.can_transition_to(next) {
            return false;
        }
        bookmark.ingest_status = next;
        bookmark.updated_at = Utc::now();
        true
    }
}

#[async_trait]
impl BookmarkRepository for MemoryStore {
    async fn insert(&self, new: NewBookmark) -> Result<()> {
        let mut state = self.state.write().await;
        if state.bookmarks.contains_key(&new.id) {
            return Err(Error::InvalidInput(format!("duplicate bookmark id {}", new.id)));
        }
        let now = Utc::now();
        state.bookmarks.insert(
            new.id,
            Bookmark {
                id: new.id,
                user_id: new.user_id,
                folder_id: new.folder_id,
                bookmark_type: new.bookmark_type,
                title: new.title,
                description: None,
                url: new.url,
                content: None,
                source_type: new.source_type,
                client_source: new.client_source,
                platform: new.platform,
                file_extension: new.file_extension,
                file_size: new.file_size,
                file_url: None,
                ingest_status: IngestStatus::Pending,
                ingest_error: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Bookmark>> {
        Ok(self.state.read().await.bookmarks.get(&id).cloned())
    }

    async fn set_file_url(&self, id: Uuid, file_url: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let bookmark = state
            .bookmarks
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("bookmark {}", id)))?;
        bookmark.file_url = Some(file_url.to_string());
        bookmark.url = Some(file_url.to_string());
        bookmark.updated_at = Utc::now();
        Ok(())
    }

    async fn set_folder(&self, id: Uuid, folder_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.bookmarks.get_mut(&id) {
            Some(bookmark) if bookmark.folder_id.is_none() => {
                bookmark.folder_id = Some(folder_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_processing(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state
            .bookmarks
            .get_mut(&id)
            .map(|b| Self::transition(b, IngestStatus::Processing))
            .unwrap_or(false))
    }

    async fn complete(&self, id: Uuid, content: CompletedContent) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(bookmark) = state.bookmarks.get_mut(&id) else {
            return Ok(false);
        };
        if !Self::transition(bookmark, IngestStatus::Completed) {
            return Ok(false);
        }
        bookmark.title = content.title;
        bookmark.description = Some(content.description);
        bookmark.content = Some(content.content);
        bookmark.ingest_error = None;
        Ok(true)
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(bookmark) = state.bookmarks.get_mut(&id) else {
            return Ok(false);
        };
        if !Self::transition(bookmark, IngestStatus::Failed) {
            return Ok(false);
        }
        bookmark.content = None;
        bookmark.ingest_error = Some(sanitize_ingest_error(error));
        Ok(true)
    }

    async fn history(&self, user_id: &str, query: HistoryQuery) -> Result<Vec<HistoryItem>> {
        let state = self.state.read().await;
        let mut items: Vec<&Bookmark> = state
            .bookmarks
            .values()
            .filter(|b| b.user_id == user_id)
            .filter(|b| query.status.map_or(true, |s| b.ingest_status == s))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(items
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .map(HistoryItem::from)
            .collect())
    }

    async fn fail_stale(&self, cutoff: DateTime<Utc>, error: &str) -> Result<Vec<Uuid>> {
        let mut state = self.state.write().await;
        let message = sanitize_ingest_error(error);
        let mut reconciled = Vec::new();
        for bookmark in state.bookmarks.values_mut() {
            if bookmark.updated_at < cutoff && Self::transition(bookmark, IngestStatus::Failed) {
                bookmark.content = None;
                bookmark.ingest_error = Some(message.clone());
                reconciled.push(bookmark.id);
            }
        }
        Ok(reconciled)
    }
}

#[async_trait]
impl FolderRepository for MemoryStore {
    async fn list(&self, user_id: &str) -> Result<Vec<Folder>> {
        let state = self.state.read().await;
        let mut folders: Vec<Folder> = state
            .folders
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        folders.sort_by_key(|f| f.sort_order);
        Ok(folders)
    }

    async fn get(&self, user_id: &str, id: Uuid) -> Result<Option<Folder>> {
        let state = self.state.read().await;
        Ok(state
            .folders
            .iter()
            .find(|f| f.id == id && f.user_id == user_id)
            .cloned())
    }

    async fn create(&self, new: NewFolder) -> Result<Folder> {
        let mut state = self.state.write().await;
        let max_order = state
            .folders
            .iter()
            .filter(|f| f.user_id == new.user_id)
            .map(|f| f.sort_order)
            .max()
            .unwrap_or(-1);
        let folder = Folder {
            id: Uuid::now_v7(),
            user_id: new.user_id,
            name: new.name,
            description: new.description,
            emoji: new.emoji,
            sort_order: max_order + 1,
        };
        state.folders.push(folder.clone());
        Ok(folder)
    }
}

#[async_trait]
impl EmbeddingRepository for MemoryStore {
    async fn replace_for_bookmark(
        &self,
        bookmark_id: Uuid,
        chunks: Vec<(String, Vector)>,
        model: &str,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.embeddings.retain(|e| e.bookmark_id != bookmark_id);
        for (i, (text, vector)) in chunks.into_iter().enumerate() {
            state.embeddings.push(Embedding {
                id: Uuid::now_v7(),
                bookmark_id,
                chunk_index: i as i32,
                text,
                vector,
                model: model.to_string(),
            });
        }
        Ok(())
    }

    async fn get_for_bookmark(&self, bookmark_id: Uuid) -> Result<Vec<Embedding>> {
        let state = self.state.read().await;
        let mut embeddings: Vec<Embedding> = state
            .embeddings
            .iter()
            .filter(|e| e.bookmark_id == bookmark_id)
            .cloned()
            .collect();
        embeddings.sort_by_key(|e| e.chunk_index);
        Ok(embeddings)
    }

    async fn delete_for_bookmark(&self, bookmark_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.embeddings.retain(|e| e.bookmark_id != bookmark_id);
        Ok(())
    }
}

#[async_trait]
impl ChatProviderRepository for MemoryStore {
    async fn default_chat_provider(&self, user_id: &str) -> Result<Option<ChatProvider>> {
        Ok(self.state.read().await.providers.get(user_id).cloned())
    }
}

#[async_trait]
impl ApiTokenRepository for MemoryStore {
    async fn resolve_user(&self, token_hash: &str) -> Result<Option<String>> {
        Ok(self.state.read().await.tokens.get(token_hash).cloned())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, path: &str, data: &[u8]) -> Result<String> {
        let mut state = self.state.write().await;
        state.blobs.insert(path.to_string(), data.to_vec());
        Ok(format!("memory://{}", path))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.state
            .read()
            .await
            .blobs
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("blob {}", path)))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.state.read().await.blobs.contains_key(path))
    }
}
