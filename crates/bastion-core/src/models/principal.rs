//! Principal (user account) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string. Never serialized to clients.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrincipal {
    pub username: String,
    pub email: String,
    /// Already-hashed password; repositories never see plaintext.
    pub password_hash: String,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePrincipal {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

impl UpdatePrincipal {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.is_active.is_none()
            && self.is_superuser.is_none()
    }
}
