//! Database error types.

/// Database operation errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// SQL error from sqlx
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Request row not found
    #[error("Request not found: {0}")]
    RequestNotFound(i64),

    /// Value that could not be decoded from a row
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Config directory not found
    #[error("Config/data directory not found")]
    NoConfigDir,

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for database operations
pub type DbResult<T> = Result<T, DbError>;
