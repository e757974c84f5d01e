//! SurrealDB repository implementations.

mod identity;
mod session;

pub use identity::SurrealIdentityRepository;
pub use session::SurrealSessionRepository;
