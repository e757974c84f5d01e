//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Lookups that find nothing
//! return [`WardenError::NotFound`](crate::error::WardenError::NotFound).

use uuid::Uuid;

use crate::error::WardenResult;
use crate::models::{
    identity::{CreateIdentity, Identity},
    session::{PutSession, RotateSession, Session},
};

// ---------------------------------------------------------------------------
// Identity directory
// ---------------------------------------------------------------------------

pub trait IdentityRepository: Send + Sync {
    fn create(&self, input: CreateIdentity) -> impl Future<Output = WardenResult<Identity>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Identity>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = WardenResult<Identity>> + Send;
    /// Block or unblock an identity. Blocked identities cannot log in.
    fn set_blocked(
        &self,
        id: Uuid,
        blocked: bool,
    ) -> impl Future<Output = WardenResult<Identity>> + Send;
}

// ---------------------------------------------------------------------------
// Sessions (one per subject)
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    /// Upsert the session for a subject, superseding any prior token.
    fn put(&self, input: PutSession) -> impl Future<Output = WardenResult<Session>> + Send;
    fn get(&self, subject: &str) -> impl Future<Output = WardenResult<Session>> + Send;
    /// Replace the session only if it still holds
    /// `input.current_token_hash`; `NotFound` otherwise.
    fn rotate(&self, input: RotateSession) -> impl Future<Output = WardenResult<Session>> + Send;
}
