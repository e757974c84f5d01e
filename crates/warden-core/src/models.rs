//! Domain models for Warden.

pub mod identity;
pub mod session;
