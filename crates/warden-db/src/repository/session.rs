//! SurrealDB implementation of [`SessionRepository`].
//!
//! Each subject owns exactly one record, `session:<subject>`. `put` is
//! an `UPSERT` on that record and `rotate` is a conditional `UPDATE`,
//! both atomic per key. Writes that lose a transaction conflict to a
//! concurrent writer of the same record are re-issued.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use warden_core::error::WardenResult;
use warden_core::models::session::{PutSession, RotateSession, Session};
use warden_core::repository::SessionRepository;

use crate::error::{DbError, retry_on_conflict};

#[derive(Debug, SurrealValue)]
struct SessionRow {
    subject: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            subject: row.subject,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            updated_at: row.updated_at,
        }
    }
}

fn first_session(rows: Vec<SessionRow>, subject: &str) -> Result<Session, DbError> {
    rows.into_iter()
        .next()
        .map(Session::from)
        .ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: subject.to_string(),
        })
}

/// SurrealDB implementation of the Session repository.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn upsert(&self, input: &PutSession) -> Result<Session, DbError> {
        let result = self
            .db
            .query(
                "UPSERT type::record('session', $subject) SET \
                 subject = $subject, \
                 token_hash = $token_hash, \
                 expires_at = $expires_at, \
                 updated_at = time::now()",
            )
            .bind(("subject", input.subject.clone()))
            .bind(("token_hash", input.token_hash.clone()))
            .bind(("expires_at", input.expires_at))
            .await?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SessionRow> = result.take(0)?;
        first_session(rows, &input.subject)
    }

    async fn swap(&self, input: &RotateSession) -> Result<Session, DbError> {
        // UPDATE never creates the record and the WHERE clause makes the
        // swap conditional, so a stale or missing session yields no rows.
        let result = self
            .db
            .query(
                "UPDATE type::record('session', $subject) SET \
                 token_hash = $token_hash, \
                 expires_at = $expires_at, \
                 updated_at = time::now() \
                 WHERE token_hash = $current_token_hash",
            )
            .bind(("subject", input.subject.clone()))
            .bind(("token_hash", input.token_hash.clone()))
            .bind(("expires_at", input.expires_at))
            .bind(("current_token_hash", input.current_token_hash.clone()))
            .await?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<SessionRow> = result.take(0)?;
        first_session(rows, &input.subject)
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    /// Concurrent puts for one subject all succeed; the last to commit
    /// holds the slot.
    async fn put(&self, input: PutSession) -> WardenResult<Session> {
        Ok(retry_on_conflict("session put", || self.upsert(&input)).await?)
    }

    async fn get(&self, subject: &str) -> WardenResult<Session> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('session', $subject)")
            .bind(("subject", subject.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_session(rows, subject)?)
    }

    /// A conflict that survives the retries means another writer kept
    /// replacing the slot, which is a lost swap like any other.
    async fn rotate(&self, input: RotateSession) -> WardenResult<Session> {
        match retry_on_conflict("session rotate", || self.swap(&input)).await {
            Ok(session) => Ok(session),
            Err(e) if e.is_conflict() => Err(DbError::NotFound {
                entity: "session".into(),
                id: input.subject,
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }
}
