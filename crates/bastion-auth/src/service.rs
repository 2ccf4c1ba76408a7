//! Authentication service: login, registration and logout orchestration.

use bastion_core::error::{BastionError, BastionResult};
use bastion_core::models::principal::{CreatePrincipal, Principal, UpdatePrincipal};
use bastion_core::models::session::{CreateSession, Session};
use bastion_core::repository::{
    PaginatedResult, Pagination, PrincipalRepository, SessionRepository,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token::{self, TokenCodec, TokenSubject};

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
    /// Observed client address; the issued token is bound to it.
    pub client_address: String,
    pub client_agent: Option<String>,
}

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    /// Signed JWT access token.
    pub access_token: String,
    /// Always `"bearer"`.
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Input for account registration.
#[derive(Debug)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Fields a principal may change on its own profile.
#[derive(Debug, Default)]
pub struct UpdateProfile {
    pub username: Option<String>,
    pub email: Option<String>,
    /// New plaintext password; hashed before it reaches the store.
    pub password: Option<String>,
}

/// Result of a single-session logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    LoggedOut,
    /// No session held the token: already logged out, rotated away or
    /// never issued.
    AlreadyInvalidated,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<P: PrincipalRepository, S: SessionRepository> {
    pub(crate) principal_repo: P,
    pub(crate) session_repo: S,
    pub(crate) codec: TokenCodec,
    pub(crate) config: AuthConfig,
}

impl<P: PrincipalRepository, S: SessionRepository> AuthService<P, S> {
    pub fn new(principal_repo: P, session_repo: S, config: AuthConfig) -> Result<Self, AuthError> {
        let codec = TokenCodec::new(&config)?;
        Ok(Self {
            principal_repo,
            session_repo,
            codec,
            config,
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create a principal with a freshly hashed password.
    pub async fn register(
        &self,
        input: RegisterInput,
        is_superuser: bool,
    ) -> BastionResult<Principal> {
        validate_username(&input.username)?;
        validate_email(&input.email)?;
        if input.password.is_empty() {
            return Err(BastionError::Validation {
                message: "password must not be empty".into(),
            });
        }

        let password_hash = password::hash_password_async(&input.password, self.pepper()).await?;
        let principal = self
            .principal_repo
            .create(CreatePrincipal {
                username: input.username,
                email: input.email,
                password_hash,
                is_superuser,
            })
            .await?;

        info!(
            principal_id = %principal.id,
            username = %principal.username,
            is_superuser,
            "Principal registered"
        );
        Ok(principal)
    }

    /// Verify credentials and open a session bound to the caller's
    /// address.
    pub async fn login(&self, input: LoginInput) -> BastionResult<LoginOutput> {
        // 1. Look up the principal; unknown usernames still pay for a
        //    hash so timing does not reveal which accounts exist.
        let principal = match self.principal_repo.get_by_username(&input.username).await {
            Ok(p) => p,
            Err(BastionError::NotFound { .. }) => {
                password::equalize_timing_async(&input.password, self.pepper()).await;
                debug!(username = %input.username, "Login for unknown username");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        // 2. Verify password.
        let valid = password::verify_password_async(
            &input.password,
            &principal.password_hash,
            self.pepper(),
        )
        .await?;
        if !valid {
            debug!(principal_id = %principal.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        // 3. Check account status.
        if !principal.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        // 4. Issue the token bound to the observed address.
        let issued = self.codec.issue(
            &TokenSubject {
                owner_id: principal.id,
                email: &principal.email,
                username: &principal.username,
                origin: &input.client_address,
            },
            self.config.access_token_ttl(),
        )?;

        // 5. Persist the session.
        let issued_at = Utc::now();
        let session = self
            .session_repo
            .put(CreateSession {
                owner_id: principal.id,
                token_hash: token::hash_token(&issued.token),
                origin_address: input.client_address,
                client_agent: input.client_agent,
                expires_at: issued.expires_at,
                issued_at,
            })
            .await?;

        info!(
            principal_id = %principal.id,
            session_id = %session.id,
            origin = %session.origin_address,
            "Session opened"
        );

        Ok(LoginOutput {
            access_token: issued.token,
            token_type: token::TOKEN_TYPE,
            expires_at: issued.expires_at,
            expires_in: self.config.access_token_lifetime_secs,
        })
    }

    /// Delete the session holding `raw_token`.
    ///
    /// The token is only hashed, never verified, so an expired token
    /// still clears its row and a forged one matches nothing.
    pub async fn logout(&self, raw_token: &str) -> BastionResult<LogoutOutcome> {
        let token_hash = token::hash_token(raw_token);
        match self.session_repo.find_by_token_hash(&token_hash).await {
            Ok(session) => {
                self.session_repo.delete(&token_hash).await?;
                info!(
                    principal_id = %session.owner_id,
                    session_id = %session.id,
                    "Session closed"
                );
                Ok(LogoutOutcome::LoggedOut)
            }
            Err(BastionError::NotFound { .. }) => Ok(LogoutOutcome::AlreadyInvalidated),
            Err(e) => Err(e),
        }
    }

    /// Revoke every session of a principal, returning how many there were.
    pub async fn logout_everywhere(&self, principal_id: Uuid) -> BastionResult<u64> {
        let revoked = self.session_repo.delete_for_owner(principal_id).await?;
        info!(principal_id = %principal_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Apply a self-service profile change.
    ///
    /// Privilege flags are not reachable from here. A password change
    /// does not revoke existing sessions; callers that want that follow
    /// up with [`logout_everywhere`](Self::logout_everywhere).
    pub async fn update_profile(
        &self,
        principal_id: Uuid,
        input: UpdateProfile,
    ) -> BastionResult<Principal> {
        if let Some(username) = &input.username {
            validate_username(username)?;
            ensure_unclaimed(principal_id, self.principal_repo.get_by_username(username).await)?;
        }
        if let Some(email) = &input.email {
            validate_email(email)?;
            ensure_unclaimed(principal_id, self.principal_repo.get_by_email(email).await)?;
        }

        let password_hash = match input.password.as_deref() {
            Some("") => {
                return Err(BastionError::Validation {
                    message: "password must not be empty".into(),
                });
            }
            Some(pw) => Some(password::hash_password_async(pw, self.pepper()).await?),
            None => None,
        };

        let update = UpdatePrincipal {
            username: input.username,
            email: input.email,
            password_hash,
            ..UpdatePrincipal::default()
        };
        if update.is_empty() {
            return self.principal_repo.get_by_id(principal_id).await;
        }

        let principal = self.principal_repo.update(principal_id, update).await?;
        info!(principal_id = %principal.id, "Profile updated");
        Ok(principal)
    }

    /// Activate or deactivate a principal. Deactivation takes effect on
    /// the next request of every open session.
    pub async fn set_active(&self, principal_id: Uuid, active: bool) -> BastionResult<Principal> {
        let principal = self
            .principal_repo
            .update(
                principal_id,
                UpdatePrincipal {
                    is_active: Some(active),
                    ..UpdatePrincipal::default()
                },
            )
            .await?;
        info!(principal_id = %principal.id, active, "Principal activation changed");
        Ok(principal)
    }

    pub async fn list_principals(
        &self,
        pagination: Pagination,
    ) -> BastionResult<PaginatedResult<Principal>> {
        self.principal_repo.list(pagination).await
    }

    /// Open sessions of a principal, oldest first.
    pub async fn sessions(&self, principal_id: Uuid) -> BastionResult<Vec<Session>> {
        self.session_repo.list_for_owner(principal_id).await
    }

    fn pepper(&self) -> Option<&str> {
        self.config.pepper.as_deref()
    }
}

/// Fails with `AlreadyExists` if `lookup` found a different principal.
fn ensure_unclaimed(principal_id: Uuid, lookup: BastionResult<Principal>) -> BastionResult<()> {
    match lookup {
        Ok(other) if other.id != principal_id => Err(BastionError::AlreadyExists {
            entity: "principal".into(),
        }),
        Ok(_) | Err(BastionError::NotFound { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}

fn validate_username(username: &str) -> BastionResult<()> {
    if username.trim().is_empty() {
        return Err(BastionError::Validation {
            message: "username must not be empty".into(),
        });
    }
    Ok(())
}

fn validate_email(email: &str) -> BastionResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(BastionError::Validation {
            message: format!("invalid email address: {email}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_needs_local_and_domain_parts() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@").is_err());
    }

    #[test]
    fn blank_username_is_rejected() {
        assert!(validate_username("alice").is_ok());
        assert!(matches!(
            validate_username("   "),
            Err(BastionError::Validation { .. })
        ));
    }
}
