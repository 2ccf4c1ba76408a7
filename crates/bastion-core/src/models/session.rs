//! Session domain model.
//!
//! A session binds one issued access token to its owner, the network
//! origin that obtained it, and its validity window. Only the SHA-256
//! digest of the token is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub token_hash: String,
    pub origin_address: String,
    pub client_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub owner_id: Uuid,
    pub token_hash: String,
    pub origin_address: String,
    pub client_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    /// Written to both `created_at` and `last_used_at`.
    pub issued_at: DateTime<Utc>,
}

/// In-place replacement of a session's token during transparent refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRotation {
    pub token_hash: String,
    pub origin_address: String,
    pub client_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub rotated_at: DateTime<Utc>,
}
