//! Bookmark (ingest record) repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use mindpocket_core::{
    sanitize_ingest_error, Bookmark, BookmarkRepository, BookmarkType, ClientSource,
    CompletedContent, Error, HistoryItem, HistoryQuery, IngestStatus, NewBookmark, Platform,
    Result, SourceType,
};

const BOOKMARK_COLUMNS: &str = "id, user_id, folder_id, type, title, description, url, content,
     source_type, client_source, platform, file_extension, file_size, file_url,
     ingest_status, ingest_error, created_at, updated_at";

/// PostgreSQL implementation of BookmarkRepository.
#[derive(Clone)]
pub struct PgBookmarkRepository {
    pool: Pool<Postgres>,
}

impl PgBookmarkRepository {
    /// Create a new PgBookmarkRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Predecessor states as text for `ingest_status = ANY($n)` guards.
    fn predecessors(next: IngestStatus) -> Vec<&'static str> {
        next.allowed_predecessors()
            .iter()
            .map(|s| s.as_str())
            .collect()
    }

    fn parse<T: std::str::FromStr<Err = String>>(value: &str) -> Result<T> {
        value.parse().map_err(Error::Internal)
    }

    fn parse_bookmark_row(row: sqlx::postgres::PgRow) -> Result<Bookmark> {
        let platform: Option<String> = row.get("platform");
        Ok(Bookmark {
            id: row.get("id"),
            user_id: row.get("user_id"),
            folder_id: row.get("folder_id"),
            bookmark_type: Self::parse::<BookmarkType>(row.get("type"))?,
            title: row.get("title"),
            description: row.get("description"),
            url: row.get("url"),
            content: row.get("content"),
            source_type: Self::parse::<SourceType>(row.get("source_type"))?,
            client_source: Self::parse::<ClientSource>(row.get("client_source"))?,
            platform: platform.as_deref().map(Self::parse::<Platform>).transpose()?,
            file_extension: row.get("file_extension"),
            file_size: row.get("file_size"),
            file_url: row.get("file_url"),
            ingest_status: Self::parse::<IngestStatus>(row.get("ingest_status"))?,
            ingest_error: row.get("ingest_error"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn parse_history_row(row: sqlx::postgres::PgRow) -> Result<HistoryItem> {
        Ok(HistoryItem {
            id: row.get("id"),
            title: row.get("title"),
            bookmark_type: Self::parse::<BookmarkType>(row.get("type"))?,
            source_type: Self::parse::<SourceType>(row.get("source_type"))?,
            ingest_status: Self::parse::<IngestStatus>(row.get("ingest_status"))?,
            ingest_error: row.get("ingest_error"),
            url: row.get("url"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl BookmarkRepository for PgBookmarkRepository {
    async fn insert(&self, bookmark: NewBookmark) -> Result<()> {
        sqlx::query(
            "INSERT INTO bookmark (id, user_id, folder_id, type, title, url, source_type,
                                   client_source, platform, file_extension, file_size,
                                   ingest_status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', now(), now())",
        )
        .bind(bookmark.id)
        .bind(&bookmark.user_id)
        .bind(bookmark.folder_id)
        .bind(bookmark.bookmark_type.as_str())
        .bind(&bookmark.title)
        .bind(&bookmark.url)
        .bind(bookmark.source_type.as_str())
        .bind(bookmark.client_source.as_str())
        .bind(bookmark.platform.map(|p| p.as_str()))
        .bind(&bookmark.file_extension)
        .bind(bookmark.file_size)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(subsystem = "db", component = "bookmarks", op = "insert", bookmark_id = %bookmark.id, "Inserted pending bookmark");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Bookmark>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM bookmark WHERE id = $1",
            BOOKMARK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_bookmark_row).transpose()
    }

    async fn set_file_url(&self, id: Uuid, file_url: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE bookmark SET file_url = $2, url = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(file_url)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("bookmark {}", id)));
        }
        Ok(())
    }

    async fn set_folder(&self, id: Uuid, folder_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE bookmark SET folder_id = $2, updated_at = now()
             WHERE id = $1 AND folder_id IS NULL",
        )
        .bind(id)
        .bind(folder_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE bookmark SET ingest_status = 'processing', ingest_error = NULL, updated_at = now()
             WHERE id = $1 AND ingest_status = ANY($2)",
        )
        .bind(id)
        .bind(Self::predecessors(IngestStatus::Processing))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn complete(&self, id: Uuid, content: CompletedContent) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE bookmark
             SET title = $2, description = $3, content = $4,
                 ingest_status = 'completed', ingest_error = NULL, updated_at = now()
             WHERE id = $1 AND ingest_status = ANY($5)",
        )
        .bind(id)
        .bind(&content.title)
        .bind(&content.description)
        .bind(&content.content)
        .bind(Self::predecessors(IngestStatus::Completed))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE bookmark
             SET ingest_status = 'failed', ingest_error = $2, content = NULL, updated_at = now()
             WHERE id = $1 AND ingest_status = ANY($3)",
        )
        .bind(id)
        .bind(sanitize_ingest_error(error))
        .bind(Self::predecessors(IngestStatus::Failed))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn history(&self, user_id: &str, query: HistoryQuery) -> Result<Vec<HistoryItem>> {
        let rows = sqlx::query(
            "SELECT id, title, type, source_type, ingest_status, ingest_error, url, created_at
             FROM bookmark
             WHERE user_id = $1 AND ($2::text IS NULL OR ingest_status = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4",
        )
        .bind(user_id)
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_history_row).collect()
    }

    async fn fail_stale(&self, cutoff: DateTime<Utc>, error: &str) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE bookmark
             SET ingest_status = 'failed', ingest_error = $2, content = NULL, updated_at = now()
             WHERE ingest_status = ANY($3) AND updated_at < $1
             RETURNING id",
        )
        .bind(cutoff)
        .bind(sanitize_ingest_error(error))
        .bind(Self::predecessors(IngestStatus::Failed))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predecessors_for_failed() {
        let preds = PgBookmarkRepository::predecessors(IngestStatus::Failed);
        assert_eq!(preds, vec!["pending", "processing"]);
    }

    #[test]
    fn test_predecessors_for_completed() {
        let preds = PgBookmarkRepository::predecessors(IngestStatus::Completed);
        assert_eq!(preds, vec!["processing"]);
    }

    #[test]
    fn test_parse_rejects_unknown_status() {
        let err = PgBookmarkRepository::parse::<IngestStatus>("stuck").unwrap_err();
        assert!(err.to_string().contains("Unknown ingest status"));
    }
}
