//! Error types for the Warden system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Database error: {0}")]
    Database(String),
}

impl WardenError {
    /// Whether this error means the looked-up record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WardenError::NotFound { .. })
    }
}

pub type WardenResult<T> = Result<T, WardenError>;
