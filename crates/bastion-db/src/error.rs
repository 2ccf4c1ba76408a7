//! Database-specific error types and conversions.

use bastion_core::error::BastionError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    Conflict { entity: String },
}

impl From<DbError> for BastionError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => BastionError::NotFound { entity, id },
            DbError::Conflict { entity } => BastionError::AlreadyExists { entity },
            other => BastionError::Database(other.to_string()),
        }
    }
}
