//! SurrealDB connection management.

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

/// Root credentials for a remote SurrealDB server.
#[derive(Debug, Clone)]
pub struct DbCredentials {
    pub username: String,
    pub password: String,
}

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Endpoint URL. `ws://host:port` for a server, `mem://` for an
    /// in-process store.
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Root credentials. `None` skips sign-in (in-memory engine).
    pub credentials: Option<DbCredentials>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".into(),
            namespace: "bastion".into(),
            database: "main".into(),
            credentials: Some(DbCredentials {
                username: "root".into(),
                password: "root".into(),
            }),
        }
    }
}

impl DbConfig {
    /// An in-process, non-persistent store.
    pub fn in_memory() -> Self {
        Self {
            url: "mem://".into(),
            namespace: "bastion".into(),
            database: "main".into(),
            credentials: None,
        }
    }
}

/// Manages a connection to SurrealDB.
///
/// The handle is internally reference-counted; cloning it is how each
/// repository gets its own scoped access.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    /// Connect to SurrealDB using the provided configuration.
    ///
    /// Signs in when credentials are configured, selects the namespace
    /// and database, and returns a ready-to-use manager.
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = any::connect(config.url.as_str()).await?;

        if let Some(creds) = &config.credentials {
            db.signin(Root {
                username: creds.username.clone(),
                password: creds.password.clone(),
            })
            .await?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Successfully connected to SurrealDB");

        Ok(Self { db })
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }
}
