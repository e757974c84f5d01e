//! Identity (directory entry) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directory entry the auth layer authenticates against.
///
/// The string form of `id` is the token subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    /// Argon2id PHC-format hash. Never leaves the subsystem.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Token subject for this identity.
    pub fn subject(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIdentity {
    pub email: String,
    /// Already-hashed credential; the directory never sees plaintext.
    pub password_hash: String,
}
