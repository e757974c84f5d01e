//! Warden Core: error types, domain models and repository traits
//! shared by the auth, database and server crates.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{WardenError, WardenResult};
