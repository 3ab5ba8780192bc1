//! Per-user provider and API token lookups.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use mindpocket_core::{
    ApiTokenRepository, ChatProvider, ChatProviderRepository, Error, Result,
};

/// PostgreSQL implementation of ChatProviderRepository.
#[derive(Clone)]
pub struct PgChatProviderRepository {
    pool: Pool<Postgres>,
}

impl PgChatProviderRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatProviderRepository for PgChatProviderRepository {
    async fn default_chat_provider(&self, user_id: &str) -> Result<Option<ChatProvider>> {
        let row = sqlx::query(
            "SELECT id, user_id, base_url, api_key, model
             FROM ai_provider
             WHERE user_id = $1 AND kind = 'chat' AND is_default
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| ChatProvider {
            id: row.get("id"),
            user_id: row.get("user_id"),
            base_url: row.get("base_url"),
            api_key: row.get("api_key"),
            model: row.get("model"),
        }))
    }
}

/// PostgreSQL implementation of ApiTokenRepository.
#[derive(Clone)]
pub struct PgApiTokenRepository {
    pool: Pool<Postgres>,
}

impl PgApiTokenRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiTokenRepository for PgApiTokenRepository {
    async fn resolve_user(&self, token_hash: &str) -> Result<Option<String>> {
        let user_id: Option<String> = sqlx::query_scalar(
            "UPDATE api_token SET last_used_at = now()
             WHERE token_hash = $1
             RETURNING user_id",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(user_id)
    }
}
