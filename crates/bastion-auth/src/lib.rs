//! Bastion Auth: the credential lifecycle. Password hashing, token
//! issuance and verification, per-request authentication with origin
//! binding, and transparent near-expiry refresh.

pub mod authenticate;
pub mod config;
pub mod context;
pub mod error;
pub mod password;
pub mod refresh;
pub mod service;
pub mod token;

pub use authenticate::{AuthenticatedPrincipal, require_superuser};
pub use config::AuthConfig;
pub use context::RequestContext;
pub use error::AuthError;
pub use refresh::RefreshInterceptor;
pub use service::{
    AuthService, LoginInput, LoginOutput, LogoutOutcome, RegisterInput, UpdateProfile,
};
pub use token::{AccessTokenClaims, TokenCodec, TokenError};
