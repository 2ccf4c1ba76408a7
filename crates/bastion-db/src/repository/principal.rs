//! SurrealDB implementation of [`PrincipalRepository`].
//!
//! Passwords arrive already hashed; this layer only stores the PHC
//! string.

use bastion_core::error::BastionResult;
use bastion_core::models::principal::{CreatePrincipal, Principal, UpdatePrincipal};
use bastion_core::repository::{PaginatedResult, Pagination, PrincipalRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct PrincipalRow {
    username: String,
    email: String,
    password_hash: String,
    is_active: bool,
    is_superuser: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct PrincipalRowWithId {
    record_id: String,
    username: String,
    email: String,
    password_hash: String,
    is_active: bool,
    is_superuser: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PrincipalRow {
    fn into_principal(self, id: Uuid) -> Principal {
        Principal {
            id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            is_active: self.is_active,
            is_superuser: self.is_superuser,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl PrincipalRowWithId {
    fn try_into_principal(self) -> Result<Principal, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid principal UUID: {e}")))?;
        Ok(Principal {
            id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            is_active: self.is_active,
            is_superuser: self.is_superuser,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the principal directory.
pub struct SurrealPrincipalRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealPrincipalRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealPrincipalRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn count_matching(&self, username: &str, email: &str) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM principal \
                 WHERE username = $username OR email = $email GROUP ALL",
            )
            .bind(("username", username.to_string()))
            .bind(("email", email.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn select_one_by(&self, field: &'static str, value: &str) -> BastionResult<Principal> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM principal \
             WHERE {field} = $value"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PrincipalRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "principal".into(),
            id: format!("{field}={value}"),
        })?;

        Ok(row.try_into_principal()?)
    }
}

impl<C: Connection> PrincipalRepository for SurrealPrincipalRepository<C> {
    async fn create(&self, input: CreatePrincipal) -> BastionResult<Principal> {
        if self.count_matching(&input.username, &input.email).await? > 0 {
            return Err(DbError::Conflict {
                entity: "principal".into(),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('principal', $id) SET \
                 username = $username, email = $email, \
                 password_hash = $password_hash, \
                 is_active = true, \
                 is_superuser = $is_superuser",
            )
            .bind(("id", id_str.clone()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .bind(("password_hash", input.password_hash))
            .bind(("is_superuser", input.is_superuser))
            .await
            .map_err(DbError::from)?;

        // The unique indexes still guard against a concurrent insert
        // slipping past the count above.
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<PrincipalRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "principal".into(),
            id: id_str,
        })?;

        Ok(row.into_principal(id))
    }

    async fn get_by_id(&self, id: Uuid) -> BastionResult<Principal> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('principal', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PrincipalRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "principal".into(),
            id: id_str,
        })?;

        Ok(row.into_principal(id))
    }

    async fn get_by_username(&self, username: &str) -> BastionResult<Principal> {
        self.select_one_by("username", username).await
    }

    async fn get_by_email(&self, email: &str) -> BastionResult<Principal> {
        self.select_one_by("email", email).await
    }

    async fn update(&self, id: Uuid, input: UpdatePrincipal) -> BastionResult<Principal> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.username.is_some() {
            sets.push("username = $username");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.password_hash.is_some() {
            sets.push("password_hash = $password_hash");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.is_superuser.is_some() {
            sets.push("is_superuser = $is_superuser");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('principal', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(username) = input.username {
            builder = builder.bind(("username", username));
        }
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(password_hash) = input.password_hash {
            builder = builder.bind(("password_hash", password_hash));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(is_superuser) = input.is_superuser {
            builder = builder.bind(("is_superuser", is_superuser));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<PrincipalRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "principal".into(),
            id: id_str,
        })?;

        Ok(row.into_principal(id))
    }

    async fn delete(&self, id: Uuid) -> BastionResult<()> {
        let id_str = id.to_string();

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE session WHERE owner_id = $id; \
                 DELETE type::record('principal', $id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        info!(principal_id = %id_str, "Principal deleted with its sessions");
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> BastionResult<PaginatedResult<Principal>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM principal GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM principal \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PrincipalRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_principal())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
