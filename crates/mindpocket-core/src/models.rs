//! Domain models for MindPocket ingestion.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// TAXONOMY
// =============================================================================

/// Kind of content a bookmark holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkType {
    Link,
    Article,
    Video,
    Image,
    Document,
    Audio,
    Spreadsheet,
    Other,
}

impl BookmarkType {
    pub const ALL: [BookmarkType; 8] = [
        BookmarkType::Link,
        BookmarkType::Article,
        BookmarkType::Video,
        BookmarkType::Image,
        BookmarkType::Document,
        BookmarkType::Audio,
        BookmarkType::Spreadsheet,
        BookmarkType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookmarkType::Link => "link",
            BookmarkType::Article => "article",
            BookmarkType::Video => "video",
            BookmarkType::Image => "image",
            BookmarkType::Document => "document",
            BookmarkType::Audio => "audio",
            BookmarkType::Spreadsheet => "spreadsheet",
            BookmarkType::Other => "other",
        }
    }
}

impl fmt::Display for BookmarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookmarkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown bookmark type: {}", s))
    }
}

/// How the content reached the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Url,
    File,
    Extension,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Url => "url",
            SourceType::File => "file",
            SourceType::Extension => "extension",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(SourceType::Url),
            "file" => Ok(SourceType::File),
            "extension" => Ok(SourceType::Extension),
            _ => Err(format!("Unknown source type: {}", s)),
        }
    }
}

/// Which front-end submitted the ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientSource {
    #[default]
    Web,
    Mobile,
    Extension,
}

impl ClientSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientSource::Web => "web",
            ClientSource::Mobile => "mobile",
            ClientSource::Extension => "extension",
        }
    }
}

impl fmt::Display for ClientSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(ClientSource::Web),
            "mobile" => Ok(ClientSource::Mobile),
            "extension" => Ok(ClientSource::Extension),
            _ => Err(format!("Unknown client source: {}", s)),
        }
    }
}

// =============================================================================
// INGEST STATE MACHINE
// =============================================================================

/// Ingest status of a bookmark.
///
/// Records move `pending → processing → {completed | failed}`. The sweep may
/// also fail a record directly from `pending`. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl IngestStatus {
    pub const ALL: [IngestStatus; 4] = [
        IngestStatus::Pending,
        IngestStatus::Processing,
        IngestStatus::Completed,
        IngestStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Pending => "pending",
            IngestStatus::Processing => "processing",
            IngestStatus::Completed => "completed",
            IngestStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestStatus::Completed | IngestStatus::Failed)
    }

    /// States from which a record may move into `self`.
    pub fn allowed_predecessors(&self) -> &'static [IngestStatus] {
        match self {
            IngestStatus::Pending => &[],
            IngestStatus::Processing => &[IngestStatus::Pending],
            IngestStatus::Completed => &[IngestStatus::Processing],
            IngestStatus::Failed => &[IngestStatus::Pending, IngestStatus::Processing],
        }
    }

    pub fn can_transition_to(&self, next: IngestStatus) -> bool {
        next.allowed_predecessors().contains(self)
    }
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown ingest status: {}", s))
    }
}

// =============================================================================
// PLATFORMS
// =============================================================================

/// External site detected from a URL, used to pick specialized converters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Wechat,
    Youtube,
    Github,
    Zhihu,
    Bilibili,
    Xiaohongshu,
    Twitter,
    Medium,
    Reddit,
    Stackoverflow,
    Juejin,
    Jianshu,
    Notion,
    Arxiv,
}

impl Platform {
    pub const ALL: [Platform; 14] = [
        Platform::Wechat,
        Platform::Youtube,
        Platform::Github,
        Platform::Zhihu,
        Platform::Bilibili,
        Platform::Xiaohongshu,
        Platform::Twitter,
        Platform::Medium,
        Platform::Reddit,
        Platform::Stackoverflow,
        Platform::Juejin,
        Platform::Jianshu,
        Platform::Notion,
        Platform::Arxiv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Wechat => "wechat",
            Platform::Youtube => "youtube",
            Platform::Github => "github",
            Platform::Zhihu => "zhihu",
            Platform::Bilibili => "bilibili",
            Platform::Xiaohongshu => "xiaohongshu",
            Platform::Twitter => "twitter",
            Platform::Medium => "medium",
            Platform::Reddit => "reddit",
            Platform::Stackoverflow => "stackoverflow",
            Platform::Juejin => "juejin",
            Platform::Jianshu => "jianshu",
            Platform::Notion => "notion",
            Platform::Arxiv => "arxiv",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown platform: {}", s))
    }
}

// =============================================================================
// BOOKMARKS
// =============================================================================

/// A persisted ingest record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: Uuid,
    pub user_id: String,
    pub folder_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub bookmark_type: BookmarkType,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
    pub source_type: SourceType,
    pub client_source: ClientSource,
    pub platform: Option<Platform>,
    pub file_extension: Option<String>,
    pub file_size: Option<i64>,
    pub file_url: Option<String>,
    pub ingest_status: IngestStatus,
    pub ingest_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert request for a new `pending` bookmark.
#[derive(Debug, Clone)]
pub struct NewBookmark {
    pub id: Uuid,
    pub user_id: String,
    pub folder_id: Option<Uuid>,
    pub bookmark_type: BookmarkType,
    pub title: String,
    pub url: Option<String>,
    pub source_type: SourceType,
    pub client_source: ClientSource,
    pub platform: Option<Platform>,
    pub file_extension: Option<String>,
    pub file_size: Option<i64>,
}

/// Fields written when a record reaches `completed`.
#[derive(Debug, Clone)]
pub struct CompletedContent {
    pub title: String,
    pub description: String,
    pub content: String,
}

/// Synchronous acknowledgment returned by every admission path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestAck {
    pub bookmark_id: Uuid,
    pub title: String,
    pub markdown: Option<String>,
    #[serde(rename = "type")]
    pub bookmark_type: BookmarkType,
    pub status: IngestStatus,
}

/// Row shape of the ingest history view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub bookmark_type: BookmarkType,
    pub source_type: SourceType,
    pub ingest_status: IngestStatus,
    pub ingest_error: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Bookmark> for HistoryItem {
    fn from(b: Bookmark) -> Self {
        Self {
            id: b.id,
            title: b.title,
            bookmark_type: b.bookmark_type,
            source_type: b.source_type,
            ingest_status: b.ingest_status,
            ingest_error: b.ingest_error,
            url: b.url,
            created_at: b.created_at,
        }
    }
}

/// Paginated history filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub status: Option<IngestStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            status: None,
            limit: crate::defaults::HISTORY_LIMIT,
            offset: 0,
        }
    }
}

// =============================================================================
// CONVERSION
// =============================================================================

/// Output of a content converter. Not persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub title: Option<String>,
    pub markdown: String,
}

impl ConversionResult {
    pub fn new(title: Option<String>, markdown: impl Into<String>) -> Self {
        Self {
            title: title.filter(|t| !t.trim().is_empty()),
            markdown: markdown.into(),
        }
    }

    /// Empty markdown counts as a failed conversion.
    pub fn is_usable(&self) -> bool {
        !self.markdown.trim().is_empty()
    }
}

// =============================================================================
// FOLDERS
// =============================================================================

/// A user folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: Uuid,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub emoji: String,
    pub sort_order: i32,
}

/// Insert request for a folder. `sort_order` is assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewFolder {
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub emoji: String,
}

/// Outcome of auto-folder resolution. Applied at most once per ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderAssignmentDecision {
    Assign(String),
    NoAssignment,
}

// =============================================================================
// AI PROVIDERS
// =============================================================================

/// Per-user model provider used for chat/tool calling.
#[derive(Debug, Clone)]
pub struct ChatProvider {
    pub id: Uuid,
    pub user_id: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

// =============================================================================
// EMBEDDINGS
// =============================================================================

/// A stored embedding chunk.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub id: Uuid,
    pub bookmark_id: Uuid,
    pub chunk_index: i32,
    pub text: String,
    pub vector: crate::Vector,
    pub model: String,
}
