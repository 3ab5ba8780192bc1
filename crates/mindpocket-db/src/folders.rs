//! Folder repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use mindpocket_core::{Error, Folder, FolderRepository, NewFolder, Result};

/// PostgreSQL implementation of FolderRepository.
#[derive(Clone)]
pub struct PgFolderRepository {
    pool: Pool<Postgres>,
}

impl PgFolderRepository {
    /// Create a new PgFolderRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_folder_row(row: sqlx::postgres::PgRow) -> Folder {
        Folder {
            id: row.get("id"),
            user_id: row.get("user_id"),
            name: row.get("name"),
            description: row.get("description"),
            emoji: row.get("emoji"),
            sort_order: row.get("sort_order"),
        }
    }
}

#[async_trait]
impl FolderRepository for PgFolderRepository {
    async fn list(&self, user_id: &str) -> Result<Vec<Folder>> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, description, emoji, sort_order
             FROM folder WHERE user_id = $1
             ORDER BY sort_order, created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_folder_row).collect())
    }

    async fn get(&self, user_id: &str, id: Uuid) -> Result<Option<Folder>> {
        let row = sqlx::query(
            "SELECT id, user_id, name, description, emoji, sort_order
             FROM folder WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_folder_row))
    }

    async fn create(&self, folder: NewFolder) -> Result<Folder> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Serialize concurrent creates for the same user so sort orders stay distinct.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&folder.user_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let max_order: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sort_order), -1) FROM folder WHERE user_id = $1",
        )
        .bind(&folder.user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let row = sqlx::query(
            "INSERT INTO folder (id, user_id, name, description, emoji, sort_order)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, user_id, name, description, emoji, sort_order",
        )
        .bind(Uuid::now_v7())
        .bind(&folder.user_id)
        .bind(&folder.name)
        .bind(&folder.description)
        .bind(&folder.emoji)
        .bind(max_order + 1)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(Self::parse_folder_row(row))
    }
}
