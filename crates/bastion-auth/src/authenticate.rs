//! Per-request authentication gate.
//!
//! A single pass with terminal outcomes. Every failure to validate the
//! bearer credential collapses to the same outward reason; the actual
//! cause only reaches the `debug` log.

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::principal::Principal;
use bastion_core::repository::{PrincipalRepository, SessionRepository};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::AuthError;
use crate::service::AuthService;
use crate::token::{self, AccessTokenClaims, TokenError};

/// Identity established for one request.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal {
    pub principal: Principal,
    pub session_id: Uuid,
    pub claims: AccessTokenClaims,
}

impl<P: PrincipalRepository, S: SessionRepository> AuthService<P, S> {
    /// Resolve the bearer token in `ctx` to an active principal.
    pub async fn authenticate(&self, ctx: &RequestContext) -> BastionResult<AuthenticatedPrincipal> {
        let Some(raw) = ctx.bearer_token.as_deref() else {
            return Err(reject(AuthError::MissingToken, ctx));
        };

        let claims = self
            .codec
            .verify(raw)
            .map_err(|e| reject(AuthError::Token(e), ctx))?;

        let owner_id = claims
            .owner_id()
            .map_err(|e| reject(AuthError::Token(e), ctx))?;

        let token_hash = token::hash_token(raw);
        let session = match self.session_repo.find_by_token_hash(&token_hash).await {
            Ok(session) => session,
            Err(BastionError::NotFound { .. }) => {
                return Err(reject(AuthError::SessionNotFound, ctx));
            }
            Err(e) => return Err(e),
        };
        let now = Utc::now();
        if session.is_expired_at(now) {
            return Err(reject(AuthError::Token(TokenError::Expired), ctx));
        }

        // The row, the signed claims and the live connection must all
        // name the same origin.
        if claims.origin != session.origin_address || claims.origin != ctx.client_address {
            debug!(
                session_id = %session.id,
                claimed = %claims.origin,
                stored = %session.origin_address,
                observed = %ctx.client_address,
                "Origin binding violated"
            );
            return Err(AuthError::OriginMismatch.into());
        }

        // The row is keyed by this token, so both must belong to the
        // same owner.
        if session.owner_id != owner_id {
            return Err(reject(AuthError::SessionNotFound, ctx));
        }

        let principal = self.principal_repo.get_by_id(owner_id).await?;
        if !principal.is_active {
            debug!(principal_id = %principal.id, "Token presented for inactive principal");
            return Err(AuthError::AccountInactive.into());
        }

        self.session_repo.touch(&token_hash, now).await?;

        Ok(AuthenticatedPrincipal {
            principal,
            session_id: session.id,
            claims,
        })
    }
}

/// Fails with `AuthorizationDenied` unless the principal is a superuser.
pub fn require_superuser(identity: &AuthenticatedPrincipal) -> BastionResult<()> {
    if identity.principal.is_superuser {
        Ok(())
    } else {
        debug!(principal_id = %identity.principal.id, "Superuser check failed");
        Err(AuthError::InsufficientPrivilege.into())
    }
}

fn reject(cause: AuthError, ctx: &RequestContext) -> BastionError {
    debug!(cause = %cause, client = %ctx.client_address, "Bearer credential rejected");
    cause.into()
}
