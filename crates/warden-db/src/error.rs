//! Database-specific error types and conversions.

use std::time::Duration;

use tracing::debug;
use warden_core::error::WardenError;

/// How many times a write that lost a transaction conflict is re-issued.
pub(crate) const MAX_CONFLICT_RETRIES: u32 = 8;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid stored value: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("{op} timed out after {after_ms} ms")]
    Timeout { op: &'static str, after_ms: u64 },
}

impl DbError {
    fn message(&self) -> Option<String> {
        match self {
            DbError::Surreal(e) => Some(e.to_string()),
            DbError::Query(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    /// The transaction was aborted because a concurrent transaction
    /// wrote the same keys first. Re-running the statement is safe.
    pub fn is_conflict(&self) -> bool {
        self.message().is_some_and(|msg| {
            msg.contains("Transaction conflict") || msg.contains("can be retried")
        })
    }

    /// A `UNIQUE` index rejected the write.
    pub fn is_unique_violation(&self) -> bool {
        self.message()
            .is_some_and(|msg| msg.contains("index") && msg.contains("already contains"))
    }
}

/// Run `attempt` until it returns something other than a transaction
/// conflict, at most [`MAX_CONFLICT_RETRIES`] extra times. The last
/// conflict is returned if every attempt loses.
pub(crate) async fn retry_on_conflict<T, F, Fut>(
    op: &'static str,
    mut attempt: F,
) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(e) if e.is_conflict() && retries < MAX_CONFLICT_RETRIES => {
                retries += 1;
                debug!(op, retries, "write conflict, retrying");
                tokio::time::sleep(Duration::from_millis(u64::from(retries) * 2)).await;
            }
            other => return other,
        }
    }
}

impl From<DbError> for WardenError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => WardenError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => WardenError::AlreadyExists { entity },
            other => WardenError::Database(other.to_string()),
        }
    }
}
