//! Error types for catalog operations

use thiserror::Error;

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur while reading from or writing to the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Database connection failed
    #[error("failed to connect to catalog backend: {0}")]
    ConnectionFailed(String),

    /// Database query failed
    #[error("catalog query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("database migration failed: {0}")]
    MigrationFailed(String),

    /// A record column could not be (de)serialized
    #[error("record serialization error: {0}")]
    SerializationError(String),

    /// A write would break a catalog invariant (e.g. a rack in two clusters)
    #[error("catalog conflict: {0}")]
    Conflict(String),

    /// A record the write refers to does not exist
    #[error("record not found: {0}")]
    NotFound(String),

    /// I/O error (file access, etc.)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => CatalogError::IoError(io_err),
            sqlx::Error::RowNotFound => CatalogError::NotFound("no rows found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                CatalogError::Conflict(db_err.to_string())
            }
            _ => CatalogError::QueryFailed(err.to_string()),
        }
    }
}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::migrate::MigrateError> for CatalogError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CatalogError::MigrationFailed(err.to_string())
    }
}
