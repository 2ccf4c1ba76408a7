//! Shared application state handed to every handler.

use std::sync::Arc;

use axum::http::HeaderName;
use bastion_auth::{AuthConfig, AuthError, AuthService, RefreshInterceptor};
use bastion_db::repository::{SurrealPrincipalRepository, SurrealSessionRepository};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

pub type PrincipalStore = SurrealPrincipalRepository<Any>;
pub type SessionStore = SurrealSessionRepository<Any>;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService<PrincipalStore, SessionStore>>,
    pub refresher: Arc<RefreshInterceptor<PrincipalStore, SessionStore>>,
    /// Parsed once from `AuthConfig::refresh_header`.
    pub refresh_header: HeaderName,
}

impl AppState {
    pub fn new(db: Surreal<Any>, config: AuthConfig) -> Result<Self, AuthError> {
        let refresh_header = HeaderName::from_bytes(config.refresh_header.as_bytes())
            .map_err(|e| {
                AuthError::InvalidConfig(format!(
                    "invalid refresh header name {:?}: {e}",
                    config.refresh_header
                ))
            })?;

        let principals = SurrealPrincipalRepository::new(db.clone());
        let sessions = SurrealSessionRepository::new(db);
        let auth = AuthService::new(principals.clone(), sessions.clone(), config.clone())?;
        let refresher = RefreshInterceptor::new(principals, sessions, config)?;

        Ok(Self {
            auth: Arc::new(auth),
            refresher: Arc::new(refresher),
            refresh_header,
        })
    }
}
