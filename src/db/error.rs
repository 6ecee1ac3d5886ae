//! Database error types.
//!
//! This module provides abstracted error types for database operations.
//! It uses miette for fancy diagnostic output and thiserror for derive macros.
//! Driver errors are classified once, here, so handlers can match on the
//! constraint that failed instead of parsing driver messages.

use miette::Diagnostic;
use thiserror::Error;

/// Database operation errors.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("{entity_type} not found: {id}")]
    #[diagnostic(code(folio::db::not_found))]
    NotFound { entity_type: String, id: String },

    #[error("{message}")]
    #[diagnostic(code(folio::db::validation_error))]
    Validation { message: String },

    #[error("No fields to update for {entity_type}")]
    #[diagnostic(
        code(folio::db::no_fields_to_update),
        help("Provide at least one field besides the identifier")
    )]
    NoFieldsToUpdate { entity_type: String },

    #[error("Foreign key violation: {message}")]
    #[diagnostic(code(folio::db::foreign_key))]
    ForeignKey { message: String },

    #[error("Unique constraint violation: {message}")]
    #[diagnostic(code(folio::db::unique_violation))]
    UniqueViolation { message: String },

    #[error("Constraint violation: {message}")]
    #[diagnostic(code(folio::db::constraint))]
    Constraint { message: String },

    #[error("Database error: {message}")]
    #[diagnostic(code(folio::db::database_error))]
    Database { message: String },

    #[error("Migration error: {message}")]
    #[diagnostic(code(folio::db::migration_error))]
    Migration { message: String },

    #[error("Connection error: {message}")]
    #[diagnostic(code(folio::db::connection_error))]
    Connection { message: String },
}

impl DbError {
    pub(crate) fn not_found(entity_type: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DbError::Validation {
            message: message.into(),
        }
    }
}

const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";
const SQLITE_CONSTRAINT_TRIGGER: &str = "1811";

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match &e {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                // RESTRICT actions surface as SQLITE_CONSTRAINT_TRIGGER (1811),
                // which sqlx reports as ErrorKind::Other.
                if matches!(
                    db_err.code().as_deref(),
                    Some(SQLITE_CONSTRAINT_FOREIGNKEY | SQLITE_CONSTRAINT_TRIGGER)
                ) && message.contains("FOREIGN KEY")
                {
                    return DbError::ForeignKey { message };
                }
                match db_err.kind() {
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKey { message },
                    ErrorKind::UniqueViolation => DbError::UniqueViolation { message },
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                        DbError::Constraint { message }
                    }
                    _ => DbError::Database { message },
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::Connection {
                    message: e.to_string(),
                }
            }
            _ => DbError::Database {
                message: e.to_string(),
            },
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration {
            message: e.to_string(),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
