//! # feed-db
//!
//! PostgreSQL persistence for the feed post service.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for posts, tags, contexts, collections,
//!   chapters, assets and the crosspost queue
//! - Filesystem byte storage for managed assets
//! - An in-memory store for tests (`mock` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use feed_db::{Database, FilesystemBackend};
//!
//! let db = Database::connect("postgres://localhost/feed", FilesystemBackend::new("/var/lib/feed/files")).await?;
//! db.migrate().await?;
//! let repos = db.repositories();
//! ```

pub mod assets;
pub mod chapters;
pub mod collections;
pub mod contexts;
pub mod crosspost;
pub mod file_storage;
#[cfg(any(test, feature = "mock"))]
pub mod memory;
pub mod pool;
pub mod posts;
pub mod tags;

// Test fixtures for integration tests
pub mod test_fixtures;

use std::sync::Arc;

use feed_core::{Error, Repositories, Result};

pub use assets::PgAssetRepository;
pub use chapters::PgChapterRepository;
pub use collections::PgCollectionRepository;
pub use contexts::PgContextRepository;
pub use crosspost::PgCrosspostRepository;
pub use file_storage::{storage_path, FilesystemBackend, StorageBackend};
#[cfg(any(test, feature = "mock"))]
pub use memory::MemoryStore;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use posts::PgPostRepository;
pub use tags::PgTagRepository;

/// Map a failed write, turning unique violations into `Error::Conflict`.
pub(crate) fn write_error(err: sqlx::Error, entity: &str) -> Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let constraint = db.constraint().unwrap_or("unique constraint");
            return Error::Conflict(format!("{} violates {}", entity, constraint));
        }
    }
    Error::Database(err)
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub posts: Arc<PgPostRepository>,
    pub tags: Arc<PgTagRepository>,
    pub contexts: Arc<PgContextRepository>,
    pub collections: Arc<PgCollectionRepository>,
    pub chapters: Arc<PgChapterRepository>,
    /// Upload metadata plus bytes in the configured storage backend.
    pub assets: Arc<PgAssetRepository>,
    pub crossposts: Arc<PgCrosspostRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool and byte store.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>, storage: impl StorageBackend + 'static) -> Self {
        Self {
            posts: Arc::new(PgPostRepository::new(pool.clone())),
            tags: Arc::new(PgTagRepository::new(pool.clone())),
            contexts: Arc::new(PgContextRepository::new(pool.clone())),
            collections: Arc::new(PgCollectionRepository::new(pool.clone())),
            chapters: Arc::new(PgChapterRepository::new(pool.clone())),
            assets: Arc::new(PgAssetRepository::new(pool.clone(), Arc::new(storage))),
            crossposts: Arc::new(PgCrosspostRepository::new(pool.clone())),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str, storage: impl StorageBackend + 'static) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool, storage))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(
        url: &str,
        config: PoolConfig,
        storage: impl StorageBackend + 'static,
    ) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool, storage))
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

    /// Repository bundle for the ingest pipeline.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            posts: self.posts.clone(),
            tags: self.tags.clone(),
            contexts: self.contexts.clone(),
            collections: self.collections.clone(),
            chapters: self.chapters.clone(),
            assets: self.assets.clone(),
            asset_store: self.assets.clone(),
            crossposts: self.crossposts.clone(),
        }
    }
}
