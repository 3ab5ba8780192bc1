//! # mindpocket-db
//!
//! PostgreSQL persistence for MindPocket ingestion.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for bookmarks, folders, embeddings,
//!   chat providers and API tokens
//! - Filesystem blob storage for uploaded files
//! - In-memory repositories (feature `memory`) for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use mindpocket_db::{Database, BookmarkRepository, HistoryQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/mindpocket").await?;
//!     let items = db.bookmarks.history("user-1", HistoryQuery::default()).await?;
//!     println!("{} ingests", items.len());
//!     Ok(())
//! }
//! ```
pub mod blob_storage;
pub mod bookmarks;
pub mod embeddings;
pub mod folders;
pub mod identity;
#[cfg(feature = "memory")]
pub mod memory;
pub mod pool;

// Re-export core types
pub use mindpocket_core::*;

pub use blob_storage::FilesystemBlobStore;
pub use bookmarks::PgBookmarkRepository;
pub use embeddings::PgEmbeddingRepository;
pub use folders::PgFolderRepository;
pub use identity::{PgApiTokenRepository, PgChatProviderRepository};
#[cfg(feature = "memory")]
pub use memory::MemoryStore;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Ingest records.
    pub bookmarks: PgBookmarkRepository,
    /// User folders.
    pub folders: PgFolderRepository,
    /// Chunk embeddings.
    pub embeddings: PgEmbeddingRepository,
    /// Default chat providers.
    pub providers: PgChatProviderRepository,
    /// API bearer tokens.
    pub tokens: PgApiTokenRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            bookmarks: PgBookmarkRepository::new(pool.clone()),
            folders: PgFolderRepository::new(pool.clone()),
            embeddings: PgEmbeddingRepository::new(pool.clone()),
            providers: PgChatProviderRepository::new(pool.clone()),
            tokens: PgApiTokenRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
