//! SurrealDB implementation of [`SessionRepository`].

use bastion_core::error::BastionResult;
use bastion_core::models::session::{CreateSession, Session, SessionRotation};
use bastion_core::repository::SessionRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

const SELECT_WITH_ID: &str = "SELECT meta::id(id) AS record_id, * FROM session";

#[derive(Debug, SurrealValue)]
struct SessionRow {
    owner_id: String,
    token_hash: String,
    origin_address: String,
    client_agent: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct SessionRowWithId {
    record_id: String,
    owner_id: String,
    token_hash: String,
    origin_address: String,
    client_agent: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
}

fn parse_owner(raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Corrupt(format!("invalid owner UUID: {e}")))
}

impl SessionRow {
    fn into_session(self, id: Uuid) -> Result<Session, DbError> {
        Ok(Session {
            id,
            owner_id: parse_owner(&self.owner_id)?,
            token_hash: self.token_hash,
            origin_address: self.origin_address,
            client_agent: self.client_agent,
            expires_at: self.expires_at,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
        })
    }
}

impl SessionRowWithId {
    fn try_into_session(self) -> Result<Session, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid session UUID: {e}")))?;
        Ok(Session {
            id,
            owner_id: parse_owner(&self.owner_id)?,
            token_hash: self.token_hash,
            origin_address: self.origin_address,
            client_agent: self.client_agent,
            expires_at: self.expires_at,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn not_found(token_hash: &str) -> DbError {
    DbError::NotFound {
        entity: "session".into(),
        id: format!("token_hash={token_hash}"),
    }
}

/// SurrealDB implementation of the session store.
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> Clone for SurrealSessionRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn count_where(
        &self,
        condition: &str,
        binding: Option<(&'static str, String)>,
    ) -> Result<u64, DbError> {
        let query = format!("SELECT count() AS total FROM session WHERE {condition} GROUP ALL");
        let mut builder = self.db.query(&query);
        if let Some(binding) = binding {
            builder = builder.bind(binding);
        }
        let mut result = builder.await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    /// Delete every session matching `condition`, returning how many
    /// rows the statement actually removed.
    async fn delete_where(
        &self,
        condition: &str,
        binding: Option<(&'static str, String)>,
    ) -> Result<u64, DbError> {
        let query = format!("DELETE session WHERE {condition} RETURN BEFORE");
        let mut builder = self.db.query(&query);
        if let Some(binding) = binding {
            builder = builder.bind(binding);
        }
        let mut result = builder
            .await?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<SessionRow> = result.take(0)?;
        Ok(rows.len() as u64)
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn put(&self, input: CreateSession) -> BastionResult<Session> {
        let existing = self
            .count_where(
                "token_hash = $token_hash",
                Some(("token_hash", input.token_hash.clone())),
            )
            .await?;
        if existing > 0 {
            return Err(DbError::Conflict {
                entity: "session".into(),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('session', $id) SET \
                 owner_id = $owner_id, \
                 token_hash = $token_hash, \
                 origin_address = $origin_address, \
                 client_agent = $client_agent, \
                 expires_at = $expires_at, \
                 created_at = $issued_at, \
                 last_used_at = $issued_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("owner_id", input.owner_id.to_string()))
            .bind(("token_hash", input.token_hash))
            .bind(("origin_address", input.origin_address))
            .bind(("client_agent", input.client_agent))
            .bind(("expires_at", input.expires_at))
            .bind(("issued_at", input.issued_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: id_str,
        })?;

        Ok(row.into_session(id)?)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> BastionResult<Session> {
        let query = format!("{SELECT_WITH_ID} WHERE token_hash = $token_hash");
        let mut result = self
            .db
            .query(&query)
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| not_found(token_hash))?;

        Ok(row.try_into_session()?)
    }

    async fn touch(&self, token_hash: &str, when: DateTime<Utc>) -> BastionResult<()> {
        self.db
            .query(
                "UPDATE session SET last_used_at = $when \
                 WHERE token_hash = $token_hash RETURN NONE",
            )
            .bind(("token_hash", token_hash.to_string()))
            .bind(("when", when))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn rotate(&self, token_hash: &str, rotation: SessionRotation) -> BastionResult<Session> {
        // The UPDATE only matches while the row still carries the old
        // digest, so reading the new digest back tells us whether this
        // writer won.
        let query = format!(
            "UPDATE session SET \
             token_hash = $new_hash, \
             origin_address = $origin_address, \
             client_agent = $client_agent, \
             expires_at = $expires_at, \
             last_used_at = $rotated_at \
             WHERE token_hash = $old_hash RETURN NONE; \
             {SELECT_WITH_ID} WHERE token_hash = $new_hash;"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("old_hash", token_hash.to_string()))
            .bind(("new_hash", rotation.token_hash))
            .bind(("origin_address", rotation.origin_address))
            .bind(("client_agent", rotation.client_agent))
            .bind(("expires_at", rotation.expires_at))
            .bind(("rotated_at", rotation.rotated_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SessionRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| not_found(token_hash))?;

        Ok(row.try_into_session()?)
    }

    async fn delete(&self, token_hash: &str) -> BastionResult<()> {
        self.delete_where(
            "token_hash = $token_hash",
            Some(("token_hash", token_hash.to_string())),
        )
        .await?;
        Ok(())
    }

    async fn delete_for_owner(&self, owner_id: Uuid) -> BastionResult<u64> {
        Ok(self
            .delete_where("owner_id = $owner_id", Some(("owner_id", owner_id.to_string())))
            .await?)
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> BastionResult<Vec<Session>> {
        let query = format!("{SELECT_WITH_ID} WHERE owner_id = $owner_id ORDER BY created_at ASC");
        let mut result = self
            .db
            .query(&query)
            .bind(("owner_id", owner_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRowWithId> = result.take(0).map_err(DbError::from)?;
        let sessions = rows
            .into_iter()
            .map(|row| row.try_into_session())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(sessions)
    }

    async fn cleanup_expired(&self) -> BastionResult<u64> {
        Ok(self.delete_where("expires_at < time::now()", None).await?)
    }
}
