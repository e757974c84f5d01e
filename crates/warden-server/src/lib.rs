//! Warden Server: HTTP gateway in front of the auth service.

pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use warden_auth::AuthService;
use warden_core::repository::{IdentityRepository, SessionRepository};

pub use config::Settings;
pub use error::ApiError;

/// Build the application router.
pub fn router<I, S>(service: Arc<AuthService<I, S>>) -> Router
where
    I: IdentityRepository + 'static,
    S: SessionRepository + 'static,
{
    Router::new()
        .route("/auth/login", post(handlers::login::<I, S>))
        .route("/auth/refresh", post(handlers::refresh::<I, S>))
        .route("/auth/validate", post(handlers::validate::<I, S>))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
