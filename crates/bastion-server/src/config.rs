//! Process configuration loaded from the environment.
//!
//! A `.env` file in the working directory is honoured. Every variable is
//! prefixed `BASTION_`; only the signing secret is mandatory.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use bastion_auth::AuthConfig;
use bastion_auth::config::MAX_ACCESS_TOKEN_LIFETIME_SECS;
use bastion_db::{DbConfig, DbCredentials};
use jsonwebtoken::Algorithm;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
    pub auth: AuthConfig,
    pub db: DbConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup instead of the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("BASTION_SECRET_KEY")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("BASTION_SECRET_KEY"))?;

        let jwt_algorithm: Algorithm =
            parse_or(&lookup, "BASTION_JWT_ALGORITHM", Algorithm::HS256)?;
        let access_minutes: u64 = parse_or(&lookup, "BASTION_ACCESS_TOKEN_MINUTES", 30)?;
        let access_token_lifetime_secs = access_minutes
            .checked_mul(60)
            .filter(|secs| (1..=MAX_ACCESS_TOKEN_LIFETIME_SECS).contains(secs))
            .ok_or_else(|| {
                invalid(
                    "BASTION_ACCESS_TOKEN_MINUTES",
                    format!(
                        "must be between 1 and {}",
                        MAX_ACCESS_TOKEN_LIFETIME_SECS / 60
                    ),
                )
            })?;
        let refresh_threshold_fraction: f64 = parse_or(&lookup, "BASTION_REFRESH_THRESHOLD", 0.1)?;
        if !(refresh_threshold_fraction > 0.0 && refresh_threshold_fraction < 1.0) {
            return Err(invalid(
                "BASTION_REFRESH_THRESHOLD",
                "must be strictly between 0 and 1",
            ));
        }

        let auth = AuthConfig {
            jwt_secret,
            jwt_algorithm,
            access_token_lifetime_secs,
            refresh_threshold_fraction,
            pepper: lookup("BASTION_PEPPER").filter(|s| !s.is_empty()),
            ..AuthConfig::default()
        };

        let db_defaults = DbConfig::default();
        let credentials = match lookup("BASTION_DB_USER") {
            Some(username) => Some(DbCredentials {
                username,
                password: lookup("BASTION_DB_PASSWORD").unwrap_or_default(),
            }),
            None => db_defaults.credentials,
        };
        let db = DbConfig {
            url: lookup("BASTION_DB_URL").unwrap_or(db_defaults.url),
            namespace: lookup("BASTION_DB_NAMESPACE").unwrap_or(db_defaults.namespace),
            database: lookup("BASTION_DB_DATABASE").unwrap_or(db_defaults.database),
            credentials,
        };

        let default_bind = SocketAddr::from(([0, 0, 0, 0], 8080));
        let bind_addr = parse_or(&lookup, "BASTION_BIND_ADDR", default_bind)?;
        let timeout_secs: u64 = parse_or(&lookup, "BASTION_REQUEST_TIMEOUT_SECS", 30)?;

        Ok(Self {
            bind_addr,
            request_timeout: Duration::from_secs(timeout_secs),
            auth,
            db,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(name, e)),
        None => Ok(default),
    }
}

fn invalid(name: &'static str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn secret_is_required() {
        let err = ServerConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("BASTION_SECRET_KEY")));
    }

    #[test]
    fn defaults_apply() {
        let config = ServerConfig::from_lookup(lookup_from(&[("BASTION_SECRET_KEY", "k")])).unwrap();
        assert_eq!(config.auth.access_token_lifetime_secs, 1800);
        assert_eq!(config.auth.jwt_algorithm, Algorithm::HS256);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.db.namespace, "bastion");
        assert!(config.auth.pepper.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("BASTION_SECRET_KEY", "k"),
            ("BASTION_JWT_ALGORITHM", "HS512"),
            ("BASTION_ACCESS_TOKEN_MINUTES", "15"),
            ("BASTION_REFRESH_THRESHOLD", "0.25"),
            ("BASTION_BIND_ADDR", "127.0.0.1:9000"),
            ("BASTION_DB_URL", "mem://"),
            ("BASTION_DB_USER", "admin"),
            ("BASTION_DB_PASSWORD", "hunter2"),
        ]))
        .unwrap();
        assert_eq!(config.auth.jwt_algorithm, Algorithm::HS512);
        assert_eq!(config.auth.access_token_lifetime_secs, 900);
        assert_eq!(config.auth.refresh_threshold_fraction, 0.25);
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.db.url, "mem://");
        assert_eq!(config.db.credentials.unwrap().username, "admin");
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = ServerConfig::from_lookup(lookup_from(&[
            ("BASTION_SECRET_KEY", "k"),
            ("BASTION_ACCESS_TOKEN_MINUTES", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "BASTION_ACCESS_TOKEN_MINUTES",
                ..
            }
        ));

        let err = ServerConfig::from_lookup(lookup_from(&[
            ("BASTION_SECRET_KEY", "k"),
            ("BASTION_REFRESH_THRESHOLD", "1.5"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn token_lifetime_is_bounded() {
        for minutes in ["0", "1000000000000", "18446744073709551615"] {
            let err = ServerConfig::from_lookup(lookup_from(&[
                ("BASTION_SECRET_KEY", "k"),
                ("BASTION_ACCESS_TOKEN_MINUTES", minutes),
            ]))
            .unwrap_err();
            assert!(
                matches!(
                    err,
                    ConfigError::Invalid {
                        name: "BASTION_ACCESS_TOKEN_MINUTES",
                        ..
                    }
                ),
                "{minutes} minutes accepted"
            );
        }

        let max_minutes = (MAX_ACCESS_TOKEN_LIFETIME_SECS / 60).to_string();
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("BASTION_SECRET_KEY", "k"),
            ("BASTION_ACCESS_TOKEN_MINUTES", max_minutes.as_str()),
        ]))
        .unwrap();
        assert_eq!(
            config.auth.access_token_lifetime_secs,
            MAX_ACCESS_TOKEN_LIFETIME_SECS
        );
    }
}
