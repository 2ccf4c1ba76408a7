//! Authentication configuration.

use chrono::Duration;
use jsonwebtoken::Algorithm;

/// Header carrying a replacement token after a transparent refresh.
pub const DEFAULT_REFRESH_HEADER: &str = "X-New-Token";

/// Longest access token lifetime the engine accepts (366 days).
pub const MAX_ACCESS_TOKEN_LIFETIME_SECS: u64 = 366 * 24 * 60 * 60;

/// Configuration for the credential lifecycle engine.
///
/// Built once at startup and handed to every constructor that needs it;
/// nothing reads settings from global state.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared HMAC secret used to sign and verify access tokens.
    pub jwt_secret: String,
    /// Signing algorithm. Only the HMAC family (HS256/384/512) is
    /// accepted.
    pub jwt_algorithm: Algorithm,
    /// Access token lifetime in seconds (default: 1800 = 30 minutes).
    pub access_token_lifetime_secs: u64,
    /// Fraction of the lifetime below which a token is transparently
    /// replaced (default: 0.1, i.e. 3 minutes of a 30 minute token).
    pub refresh_threshold_fraction: f64,
    /// Optional pepper prepended to passwords before Argon2id.
    pub pepper: Option<String>,
    /// Request paths the refresh interceptor never touches. An entry
    /// matches itself and anything below it on a `/` boundary; `/` is
    /// matched exactly.
    pub public_paths: Vec<String>,
    /// Response header carrying the replacement token.
    pub refresh_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_algorithm: Algorithm::HS256,
            access_token_lifetime_secs: 1800,
            refresh_threshold_fraction: 0.1,
            pepper: None,
            public_paths: vec![
                "/".into(),
                "/api/v1/auth/login".into(),
                "/api/v1/auth/register".into(),
                "/health".into(),
                "/ping".into(),
            ],
            refresh_header: DEFAULT_REFRESH_HEADER.into(),
        }
    }
}

impl AuthConfig {
    /// Lifetime of a freshly issued token, capped at
    /// [`MAX_ACCESS_TOKEN_LIFETIME_SECS`].
    pub fn access_token_ttl(&self) -> Duration {
        Duration::seconds(self.lifetime_secs() as i64)
    }

    /// Remaining lifetime under which a token gets replaced.
    pub fn refresh_threshold(&self) -> Duration {
        let fraction = self.refresh_threshold_fraction.clamp(0.0, 1.0);
        let millis = self.lifetime_secs() as f64 * 1000.0 * fraction;
        Duration::milliseconds(millis as i64)
    }

    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|public| {
            if public == "/" {
                return path == "/";
            }
            let base = public.trim_end_matches('/');
            path == base
                || path
                    .strip_prefix(base)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn lifetime_secs(&self) -> u64 {
        self.access_token_lifetime_secs
            .min(MAX_ACCESS_TOKEN_LIFETIME_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_is_three_minutes() {
        let config = AuthConfig::default();
        assert_eq!(config.access_token_ttl(), Duration::minutes(30));
        assert_eq!(config.refresh_threshold(), Duration::minutes(3));
    }

    #[test]
    fn root_is_matched_exactly() {
        let config = AuthConfig::default();
        assert!(config.is_public_path("/"));
        assert!(!config.is_public_path("/api/v1/users/me"));
    }

    #[test]
    fn public_prefixes_match() {
        let config = AuthConfig::default();
        assert!(config.is_public_path("/api/v1/auth/login"));
        assert!(config.is_public_path("/health"));
        assert!(config.is_public_path("/health/live"));
        assert!(!config.is_public_path("/api/v1/auth/logout"));
    }

    #[test]
    fn public_paths_stop_at_segment_boundary() {
        let config = AuthConfig::default();
        assert!(!config.is_public_path("/api/v1/auth/register-superuser"));
        assert!(!config.is_public_path("/healthz"));
        assert!(!config.is_public_path("/pingpong"));
        assert!(config.is_public_path("/api/v1/auth/register"));
    }

    #[test]
    fn oversized_lifetime_is_capped() {
        let config = AuthConfig {
            access_token_lifetime_secs: 1_000_000_000_000 * 60,
            ..AuthConfig::default()
        };
        let cap = Duration::seconds(MAX_ACCESS_TOKEN_LIFETIME_SECS as i64);
        assert_eq!(config.access_token_ttl(), cap);
        assert!(config.refresh_threshold() < cap);
    }
}
