// src/error.rs

use thiserror::Error;

/// Crate-wide error type.
/// Every storage and recording call returns `Result<_, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    /// A referenced row (level, user) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed attempt data, rejected before any write.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Concurrent update on the same user that survived one retry.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl AppError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

// SQLSTATE codes PostgreSQL uses when a transaction lost a race.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";

/// Converts `sqlx::Error` into `AppError`.
/// Lost races become `Conflict` so the recorder can retry; everything else is
/// passed through untouched.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if code == SERIALIZATION_FAILURE
                    || code == DEADLOCK_DETECTED
                    || code == UNIQUE_VIOLATION
                {
                    return AppError::Conflict(db_err.message().to_string());
                }
            }
        }
        AppError::Database(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
