//! Error types for the Bastion system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BastionError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BastionError {
    /// True for failures caused by the backing store or a broken
    /// invariant rather than by the caller.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            BastionError::Database(_) | BastionError::Crypto(_) | BastionError::Internal(_)
        )
    }
}

pub type BastionResult<T> = Result<T, BastionError>;
