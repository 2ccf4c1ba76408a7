//! Transparent replacement of near-expiry access tokens.
//!
//! The interceptor runs after a request has succeeded. If the bearer
//! token is close to expiry it mints a replacement for the same owner
//! from the principal's current record,
//! rotates the session row onto it, and hands the new token back for the
//! transport to attach as a response header. Failures here never affect
//! the response.

use bastion_core::error::BastionResult;
use bastion_core::models::session::SessionRotation;
use bastion_core::repository::{PrincipalRepository, SessionRepository};
use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::context::RequestContext;
use crate::error::AuthError;
use crate::token::{self, TokenCodec, TokenSubject};

/// True when a token with `remaining` lifetime is still valid but
/// inside the refresh window.
pub fn needs_refresh(remaining: Duration, threshold: Duration) -> bool {
    remaining > Duration::zero() && remaining < threshold
}

pub struct RefreshInterceptor<P: PrincipalRepository, S: SessionRepository> {
    principal_repo: P,
    session_repo: S,
    codec: TokenCodec,
    config: AuthConfig,
}

impl<P: PrincipalRepository, S: SessionRepository> RefreshInterceptor<P, S> {
    pub fn new(principal_repo: P, session_repo: S, config: AuthConfig) -> Result<Self, AuthError> {
        let codec = TokenCodec::new(&config)?;
        Ok(Self {
            principal_repo,
            session_repo,
            codec,
            config,
        })
    }

    /// Whether a request to `path` is a refresh candidate at all.
    pub fn applies_to(&self, path: &str, ctx: &RequestContext) -> bool {
        ctx.bearer_token.is_some() && !self.config.is_public_path(path)
    }

    /// Replacement token for the request's bearer token, if one is due.
    ///
    /// Only call this once the downstream response is known to be a
    /// success. Errors are logged and reported as "no replacement".
    pub async fn maybe_refresh(&self, ctx: &RequestContext) -> Option<String> {
        let raw = ctx.bearer_token.as_deref()?;
        match self.try_refresh(raw, ctx).await {
            Ok(replacement) => replacement,
            Err(e) => {
                debug!(error = %e, client = %ctx.client_address, "Token refresh skipped");
                None
            }
        }
    }

    async fn try_refresh(&self, raw: &str, ctx: &RequestContext) -> BastionResult<Option<String>> {
        let claims = self.codec.verify(raw).map_err(AuthError::Token)?;

        let now = Utc::now();
        let remaining = claims.remaining_lifetime(now);
        if !needs_refresh(remaining, self.config.refresh_threshold()) {
            return Ok(None);
        }

        let old_hash = token::hash_token(raw);
        let session = self.session_repo.find_by_token_hash(&old_hash).await?;

        // A replacement is bound to the address the request came from,
        // so only refresh tokens that are already bound to it.
        if claims.origin != ctx.client_address || session.origin_address != claims.origin {
            return Err(AuthError::OriginMismatch.into());
        }

        let owner_id = claims.owner_id().map_err(AuthError::Token)?;
        if session.owner_id != owner_id {
            return Err(AuthError::SessionNotFound.into());
        }

        // Identity claims come from the current record, not the old token.
        let principal = self.principal_repo.get_by_id(owner_id).await?;
        if !principal.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        let issued = self.codec.issue(
            &TokenSubject {
                owner_id,
                email: &principal.email,
                username: &principal.username,
                origin: &ctx.client_address,
            },
            self.config.access_token_ttl(),
        )?;

        let rotated = self
            .session_repo
            .rotate(
                &old_hash,
                SessionRotation {
                    token_hash: token::hash_token(&issued.token),
                    origin_address: ctx.client_address.clone(),
                    client_agent: ctx.client_agent.clone().or(session.client_agent),
                    expires_at: issued.expires_at,
                    rotated_at: now,
                },
            )
            .await?;

        info!(
            principal_id = %owner_id,
            session_id = %rotated.id,
            remaining_secs = remaining.num_seconds(),
            "Access token refreshed"
        );
        Ok(Some(issued.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_window_is_open_interval() {
        let threshold = Duration::minutes(3);
        assert!(needs_refresh(Duration::minutes(2), threshold));
        assert!(!needs_refresh(Duration::minutes(10), threshold));
        assert!(!needs_refresh(threshold, threshold));
        assert!(!needs_refresh(Duration::zero(), threshold));
        assert!(!needs_refresh(Duration::seconds(-5), threshold));
    }
}
