//! # Error Handling
//!
//! Storage-level error taxonomy shared by every store. Higher layers wrap
//! [`RepositoryError`] in their own enums and decide how a not-found or a
//! conflict should surface.

use sea_orm::{DbErr, RuntimeErr};
use thiserror::Error;

/// Errors produced by the notification, channel preference and validation code stores.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[source] DbErr),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    /// A uniqueness constraint rejected the write.
    #[error("already exists: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Classifies a database error, turning unique-constraint violations into
    /// [`RepositoryError::Conflict`].
    pub fn database_error(err: DbErr) -> Self {
        if is_unique_violation(&err) {
            Self::Conflict(err.to_string())
        } else {
            Self::Database(err)
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<DbErr> for RepositoryError {
    fn from(err: DbErr) -> Self {
        Self::database_error(err)
    }
}

/// Returns true when the driver reports a unique constraint violation
/// (Postgres `23505`, SQLite `1555`/`2067`).
pub fn is_unique_violation(error: &DbErr) -> bool {
    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error
        .code()
        .is_some_and(|code| code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code.as_ref()))
}
