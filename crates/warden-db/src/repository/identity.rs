//! SurrealDB implementation of [`IdentityRepository`].
//!
//! Credentials arrive already hashed; this repository never sees a
//! plaintext password.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::identity::{CreateIdentity, Identity};
use warden_core::repository::IdentityRepository;

use crate::error::{DbError, retry_on_conflict};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct IdentityRow {
    email: String,
    password_hash: String,
    is_blocked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record key via `record::id(id)`.
#[derive(Debug, SurrealValue)]
struct IdentityRowWithId {
    record_id: String,
    email: String,
    password_hash: String,
    is_blocked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IdentityRow {
    fn into_identity(self, id: Uuid) -> Identity {
        Identity {
            id,
            email: self.email,
            password_hash: self.password_hash,
            is_blocked: self.is_blocked,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl IdentityRowWithId {
    fn try_into_identity(self) -> Result<Identity, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid identity UUID: {e}")))?;
        Ok(Identity {
            id,
            email: self.email,
            password_hash: self.password_hash,
            is_blocked: self.is_blocked,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the identity directory.
#[derive(Clone)]
pub struct SurrealIdentityRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealIdentityRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn insert(&self, input: &CreateIdentity) -> Result<Identity, DbError> {
        match self.get_by_email(&input.email).await {
            Ok(_) => {
                return Err(DbError::AlreadyExists {
                    entity: "identity".into(),
                });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(DbError::Query(e.to_string())),
        }

        let id = Uuid::new_v4();

        let result = self
            .db
            .query(
                "CREATE type::record('identity', $id) SET \
                 email = $email, \
                 password_hash = $password_hash, \
                 is_blocked = false",
            )
            .bind(("id", id.to_string()))
            .bind(("email", input.email.clone()))
            .bind(("password_hash", input.password_hash.clone()))
            .await?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<IdentityRow> = result.take(0)?;
        Self::first_row(rows, id)
    }

    fn first_row(rows: Vec<IdentityRow>, id: Uuid) -> Result<Identity, DbError> {
        rows.into_iter()
            .next()
            .map(|row| row.into_identity(id))
            .ok_or_else(|| DbError::NotFound {
                entity: "identity".into(),
                id: id.to_string(),
            })
    }
}

impl<C: Connection> IdentityRepository for SurrealIdentityRepository<C> {
    /// Rejects a taken email with `AlreadyExists`, including when a
    /// concurrent create wins the unique index first.
    async fn create(&self, input: CreateIdentity) -> WardenResult<Identity> {
        let created = retry_on_conflict("identity create", || self.insert(&input)).await;
        match created {
            Err(e) if e.is_unique_violation() => Err(DbError::AlreadyExists {
                entity: "identity".into(),
            }
            .into()),
            other => Ok(other?),
        }
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Identity> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('identity', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdentityRow> = result.take(0).map_err(DbError::from)?;
        Ok(Self::first_row(rows, id)?)
    }

    async fn get_by_email(&self, email: &str) -> WardenResult<Identity> {
        let mut result = self
            .db
            .query(
                "SELECT record::id(id) AS record_id, * FROM identity \
                 WHERE email = $email",
            )
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<IdentityRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "identity".into(),
            id: format!("email={email}"),
        })?;

        Ok(row.try_into_identity()?)
    }

    async fn set_blocked(&self, id: Uuid, blocked: bool) -> WardenResult<Identity> {
        let result = self
            .db
            .query(
                "UPDATE type::record('identity', $id) SET \
                 is_blocked = $is_blocked, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("is_blocked", blocked))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<IdentityRow> = result.take(0).map_err(DbError::from)?;
        Ok(Self::first_row(rows, id)?)
    }
}
