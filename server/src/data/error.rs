//! Unified error type for the data layer

use thiserror::Error;

use super::sqlite::SqliteError;

/// Unified error type for data layer operations
#[derive(Error, Debug)]
pub enum DataError {
    /// SQLite database error
    #[error("Database error: {0}")]
    Sqlite(sqlx::Error),

    /// Migration failed
    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Query timeout
    #[error("Query timeout after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Operation not implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Conflict error (e.g. duplicate entry, constraint violation)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Requested row does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl DataError {
    pub fn timeout(timeout_secs: u64) -> Self {
        Self::Timeout { timeout_secs }
    }

    /// Check if this is a connection-related error that might be transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Sqlite(e) => {
                matches!(
                    e,
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
            }
            _ => false,
        }
    }

    /// Get the backend name that generated this error
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Sqlite(_) | Self::MigrationFailed { .. } => "sqlite",
            _ => "unknown",
        }
    }
}

impl From<SqliteError> for DataError {
    fn from(e: SqliteError) -> Self {
        match e {
            SqliteError::Database(e) => Self::Sqlite(e),
            SqliteError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                version,
                name,
                error,
            },
            SqliteError::Io(e) => Self::Io(e),
            SqliteError::Conflict(msg) => Self::Conflict(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_failed_error_display() {
        let err = DataError::MigrationFailed {
            version: 2,
            name: "add_cached_query_results".to_string(),
            error: "syntax error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Migration 2 (add_cached_query_results) failed: syntax error"
        );
    }

    #[test]
    fn test_timeout_error_display() {
        let err = DataError::timeout(30);
        assert_eq!(err.to_string(), "Query timeout after 30s");
    }

    #[test]
    fn test_backend_method() {
        assert_eq!(DataError::timeout(30).backend(), "unknown");
        assert_eq!(
            DataError::MigrationFailed {
                version: 1,
                name: "test".into(),
                error: "error".into()
            }
            .backend(),
            "sqlite"
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(DataError::timeout(30).is_transient());
        assert!(!DataError::Config("bad config".into()).is_transient());
    }

    #[test]
    fn test_from_sqlite_error() {
        let err: DataError = SqliteError::Conflict("duplicate".to_string()).into();
        assert!(matches!(err, DataError::Conflict(_)));
    }
}
