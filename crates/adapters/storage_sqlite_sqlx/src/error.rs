//! Storage-specific error type wrapping sqlx errors.

use relaysync_domain::error::RelaySyncError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StorageError {
    /// Convert into a [`RelaySyncError::Storage`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> RelaySyncError {
        RelaySyncError::Storage(Box::new(self))
    }
}

impl From<StorageError> for RelaySyncError {
    fn from(err: StorageError) -> Self {
        err.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_database_error_to_storage_error() {
        let err: RelaySyncError = StorageError::from(sqlx::Error::PoolClosed).into();
        assert!(matches!(err, RelaySyncError::Storage(_)));
    }

    #[test]
    fn should_keep_sqlx_error_as_source() {
        let err = StorageError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), "database error");
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("no rows"));
    }
}
