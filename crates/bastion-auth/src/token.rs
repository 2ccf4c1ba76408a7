//! Access token codec.
//!
//! Tokens are HMAC-signed JWTs. The codec is built from the immutable
//! [`AuthConfig`] and is the only place that touches the signing secret.
//! Every decode verifies the signature; there is no unverified peek.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{AuthConfig, MAX_ACCESS_TOKEN_LIFETIME_SECS};
use crate::error::AuthError;

/// Token type reported to clients at login.
pub const TOKEN_TYPE: &str = "bearer";

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: the principal's email.
    pub sub: String,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Client address the token is bound to.
    pub origin: String,
    pub username: String,
    /// Owning principal (UUID string).
    pub owner_id: String,
    /// Unique token ID (UUID string).
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn owner_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.owner_id).map_err(|_| TokenError::Malformed)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Time left before expiry; negative once expired.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at() - now
    }
}

/// Why a token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,
}

/// Identity a token is minted for.
#[derive(Debug, Clone, Copy)]
pub struct TokenSubject<'a> {
    pub owner_id: Uuid,
    pub email: &'a str,
    pub username: &'a str,
    pub origin: &'a str,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub claims: AccessTokenClaims,
}

/// Signs and verifies access tokens.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::InvalidConfig("JWT secret must not be empty".into()));
        }
        if !matches!(
            config.jwt_algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::InvalidConfig(format!(
                "unsupported signing algorithm {:?}; expected HS256, HS384 or HS512",
                config.jwt_algorithm
            )));
        }
        if config.access_token_lifetime_secs == 0
            || config.access_token_lifetime_secs > MAX_ACCESS_TOKEN_LIFETIME_SECS
        {
            return Err(AuthError::InvalidConfig(format!(
                "access token lifetime must be between 1 and {MAX_ACCESS_TOKEN_LIFETIME_SECS} seconds"
            )));
        }

        let mut validation = Validation::new(config.jwt_algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            algorithm: config.jwt_algorithm,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        })
    }

    /// Sign a token for `subject` expiring at `now + ttl`.
    pub fn issue(&self, subject: &TokenSubject<'_>, ttl: Duration) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::InvalidConfig(format!("token lifetime out of range: {ttl}")))?;
        let claims = AccessTokenClaims {
            sub: subject.email.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            origin: subject.origin.to_string(),
            username: subject.username.to_string(),
            owner_id: subject.owner_id.to_string(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
            claims,
        })
    }

    /// Check the signature and expiry of `token` and return its claims.
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        jsonwebtoken::decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::SignatureInvalid
                }
                _ => TokenError::Malformed,
            })
    }
}

/// SHA-256 digest of a raw token, hex-encoded.
///
/// This is the value stored in the database as `session.token_hash`.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
