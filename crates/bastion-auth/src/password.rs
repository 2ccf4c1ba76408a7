//! Password hashing and verification using Argon2id.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::error::AuthError;

fn peppered_input<'a>(password: &'a str, pepper: Option<&str>, buf: &'a mut String) -> &'a [u8] {
    match pepper {
        Some(p) => {
            *buf = format!("{p}{password}");
            buf.as_bytes()
        }
        None => password.as_bytes(),
    }
}

fn hasher() -> Result<Argon2<'static>, AuthError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| AuthError::Crypto(format!("argon2 params error: {e}")))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hash a password with Argon2id into a PHC-format string.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing. The salt is randomly generated for each call.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, AuthError> {
    let mut buf = String::new();
    let input = peppered_input(password, pepper, &mut buf);

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = hasher()?
        .hash_password(input, &salt)
        .map_err(|e| AuthError::Crypto(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::Crypto)` if the stored hash is malformed.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let mut buf = String::new();
    let input = peppered_input(password, pepper, &mut buf);

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    // Parameters are read from the PHC string, so the default instance
    // verifies hashes produced by `hash_password`.
    match Argon2::default().verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// Spend roughly the cost of a real verification when the account does
/// not exist, so response time does not reveal which usernames are
/// registered.
pub fn equalize_timing(password: &str, pepper: Option<&str>) {
    let _ = hash_password(password, pepper);
}

// Argon2id holds ~19 MiB and a core for tens of milliseconds; the async
// variants below run it on tokio's blocking pool.

async fn run_blocking<T, F>(f: F) -> Result<T, AuthError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Crypto(format!("password task failed: {e}")))?
}

/// [`hash_password`] off the async runtime.
pub async fn hash_password_async(password: &str, pepper: Option<&str>) -> Result<String, AuthError> {
    let password = password.to_owned();
    let pepper = pepper.map(str::to_owned);
    run_blocking(move || hash_password(&password, pepper.as_deref())).await
}

/// [`verify_password`] off the async runtime.
pub async fn verify_password_async(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    let pepper = pepper.map(str::to_owned);
    run_blocking(move || verify_password(&password, &hash, pepper.as_deref())).await
}

/// [`equalize_timing`] off the async runtime.
pub async fn equalize_timing_async(password: &str, pepper: Option<&str>) {
    let password = password.to_owned();
    let pepper = pepper.map(str::to_owned);
    let _ = run_blocking(move || {
        equalize_timing(&password, pepper.as_deref());
        Ok(())
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("hunter2", None).unwrap();
        assert!(verify_password("hunter2", &hash, None).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("hunter2", None).unwrap();
        assert!(!verify_password("wrong", &hash, None).unwrap());
    }

    #[test]
    fn pepper_is_applied() {
        let hash = hash_password("hunter2", Some("pepper!")).unwrap();
        assert!(verify_password("hunter2", &hash, Some("pepper!")).unwrap());
        // Without pepper should fail.
        assert!(!verify_password("hunter2", &hash, None).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same", None).unwrap();
        let b = hash_password("same", None).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn blocking_pool_variants_agree() {
        let hash = hash_password_async("hunter2", Some("pepper!")).await.unwrap();
        assert!(verify_password("hunter2", &hash, Some("pepper!")).unwrap());
        assert!(
            verify_password_async("hunter2", &hash, Some("pepper!"))
                .await
                .unwrap()
        );
        assert!(!verify_password_async("wrong", &hash, Some("pepper!")).await.unwrap());
        assert!(verify_password_async("pw", "not-a-hash", None).await.is_err());
    }

    #[test]
    fn malformed_hash_returns_error() {
        let result = verify_password("pw", "not-a-hash", None);
        assert!(result.is_err());
    }
}
