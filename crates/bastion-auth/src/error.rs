//! Authentication error types.

use bastion_core::error::BastionError;
use thiserror::Error;

use crate::token::TokenError;

/// Outward reason for every rejected bearer credential. The specific
/// cause is only ever logged.
pub const CREDENTIALS_REJECTED: &str = "could not validate credentials";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    AccountInactive,

    #[error("not enough permissions")]
    InsufficientPrivilege,

    #[error("missing bearer token")]
    MissingToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("session not found")]
    SessionNotFound,

    #[error("origin binding violated")]
    OriginMismatch,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for BastionError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => BastionError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::MissingToken
            | AuthError::Token(_)
            | AuthError::SessionNotFound
            | AuthError::OriginMismatch => BastionError::AuthenticationFailed {
                reason: CREDENTIALS_REJECTED.into(),
            },
            AuthError::AccountInactive | AuthError::InsufficientPrivilege => {
                BastionError::AuthorizationDenied {
                    reason: err.to_string(),
                }
            }
            AuthError::InvalidConfig(msg) => BastionError::Internal(msg),
            AuthError::Crypto(msg) => BastionError::Crypto(msg),
        }
    }
}
