//! Embedding repository implementation.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use mindpocket_core::{Embedding, EmbeddingRepository, Error, Result};

/// PostgreSQL implementation of EmbeddingRepository.
#[derive(Clone)]
pub struct PgEmbeddingRepository {
    pool: Pool<Postgres>,
}

impl PgEmbeddingRepository {
    /// Create a new PgEmbeddingRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmbeddingRepository for PgEmbeddingRepository {
    async fn replace_for_bookmark(
        &self,
        bookmark_id: Uuid,
        chunks: Vec<(String, Vector)>,
        model: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM embedding WHERE bookmark_id = $1")
            .bind(bookmark_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        for (i, (text, vector)) in chunks.into_iter().enumerate() {
            sqlx::query(
                "INSERT INTO embedding (id, bookmark_id, chunk_index, text, vector, model)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::now_v7())
            .bind(bookmark_id)
            .bind(i as i32)
            .bind(&text)
            .bind(&vector)
            .bind(model)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn get_for_bookmark(&self, bookmark_id: Uuid) -> Result<Vec<Embedding>> {
        let rows = sqlx::query(
            "SELECT id, bookmark_id, chunk_index, text, vector, model
             FROM embedding
             WHERE bookmark_id = $1
             ORDER BY chunk_index",
        )
        .bind(bookmark_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let embeddings = rows
            .into_iter()
            .map(|row| Embedding {
                id: row.get("id"),
                bookmark_id: row.get("bookmark_id"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                vector: row.get("vector"),
                model: row.get("model"),
            })
            .collect();

        Ok(embeddings)
    }

    async fn delete_for_bookmark(&self, bookmark_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM embedding WHERE bookmark_id = $1")
            .bind(bookmark_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
