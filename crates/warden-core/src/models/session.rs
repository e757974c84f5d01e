//! Session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single current refresh token of a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub subject: String,
    /// SHA-256 hex digest of the current refresh token.
    pub token_hash: String,
    /// Expiry of the current refresh token.
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert input: replaces whatever session `subject` had.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutSession {
    pub subject: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Compare-and-swap input: replaces the session only while it still
/// holds `current_token_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotateSession {
    pub subject: String,
    pub current_token_hash: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}
