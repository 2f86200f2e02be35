//! Database error types.

use kiln_core::Retryable;
use thiserror::Error;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("write conflict: {0}")]
    WriteConflict(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());
        match code.as_deref() {
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                DbError::WriteConflict(err.to_string())
            }
            Some(UNIQUE_VIOLATION) => DbError::Duplicate(err.to_string()),
            _ => DbError::Database(err),
        }
    }
}

impl Retryable for DbError {
    fn is_write_conflict(&self) -> bool {
        matches!(self, DbError::WriteConflict(_))
    }
}

impl From<DbError> for kiln_core::Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => kiln_core::Error::NotFound(msg),
            DbError::Duplicate(msg) => kiln_core::Error::Conflict(msg),
            DbError::WriteConflict(msg) => kiln_core::Error::WriteConflict(msg),
            other => kiln_core::Error::Unexpected(other.to_string()),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;
