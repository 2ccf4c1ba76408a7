//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Implementations must make
//! every write atomic: a failed operation never leaves a partially
//! updated row visible to concurrent readers.

use uuid::Uuid;

use crate::error::BastionResult;
use crate::models::{
    principal::{CreatePrincipal, Principal, UpdatePrincipal},
    session::{CreateSession, Session, SessionRotation},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Principal directory
// ---------------------------------------------------------------------------

pub trait PrincipalRepository: Send + Sync {
    /// Fails with `AlreadyExists` if the username or email is taken.
    fn create(
        &self,
        input: CreatePrincipal,
    ) -> impl Future<Output = BastionResult<Principal>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = BastionResult<Principal>> + Send;
    fn get_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = BastionResult<Principal>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = BastionResult<Principal>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdatePrincipal,
    ) -> impl Future<Output = BastionResult<Principal>> + Send;
    /// Hard delete. Cascades to every session owned by the principal.
    fn delete(&self, id: Uuid) -> impl Future<Output = BastionResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = BastionResult<PaginatedResult<Principal>>> + Send;
}

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

/// Persisted mapping from issued token (by digest) to session metadata.
pub trait SessionRepository: Send + Sync {
    /// Insert a new session. Fails with `AlreadyExists` if the token
    /// digest is already present.
    fn put(&self, input: CreateSession) -> impl Future<Output = BastionResult<Session>> + Send;

    fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = BastionResult<Session>> + Send;

    /// Record a use of the session.
    fn touch(
        &self,
        token_hash: &str,
        when: chrono::DateTime<chrono::Utc>,
    ) -> impl Future<Output = BastionResult<()>> + Send;

    /// Replace the token of the session currently holding `token_hash`.
    ///
    /// Conditional on the old digest: if another writer already rotated
    /// the row this returns `NotFound`.
    fn rotate(
        &self,
        token_hash: &str,
        rotation: SessionRotation,
    ) -> impl Future<Output = BastionResult<Session>> + Send;

    /// Remove the session. Idempotent.
    fn delete(&self, token_hash: &str) -> impl Future<Output = BastionResult<()>> + Send;

    /// Remove every session of an owner, returning how many were removed.
    fn delete_for_owner(&self, owner_id: Uuid) -> impl Future<Output = BastionResult<u64>> + Send;

    fn list_for_owner(
        &self,
        owner_id: Uuid,
    ) -> impl Future<Output = BastionResult<Vec<Session>>> + Send;

    /// Remove sessions whose expiry has passed. Nothing calls this
    /// automatically.
    fn cleanup_expired(&self) -> impl Future<Output = BastionResult<u64>> + Send;
}
