//! Database connection pool and initialization.

use std::path::PathBuf;

use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::{DbError, DbResult},
    sqlite_runtime::create_file_pool,
};

/// Database pool wrapper
#[derive(Debug, Clone)]
pub struct DbPool {
    pool: SqlitePool,
}

impl DbPool {
    /// Initialize database with migrations
    ///
    /// This function:
    /// 1. Ensures the data directory exists
    /// 2. Creates/connects to the database
    /// 3. Runs migrations
    ///
    /// `path_override` replaces the default data-dir location when set
    /// (HARMARI_DB_PATH from the environment config).
    pub async fn new(path_override: Option<&str>) -> DbResult<Self> {
        let db_path = match path_override {
            Some(p) => PathBuf::from(p),
            None => Self::db_path()?,
        };
        info!("Initializing database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = create_file_pool(&db_path, 5).await?;

        Self::run_migrations(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    /// Get the inner SQLx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the default database file path
    pub fn db_path() -> DbResult<PathBuf> {
        let data_dir = dirs::data_dir().ok_or(DbError::NoConfigDir)?;
        Ok(data_dir.join("harmari").join("harmari.sqlite3"))
    }

    /// Run database migrations
    async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Close the pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create a DbPool from an existing SqlitePool (for testing)
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
