//! Route handlers. Each one decodes the request, calls the auth
//! service and encodes the result; nothing else.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use warden_auth::{AuthService, LoginInput, RefreshInput, TokenPair};
use warden_core::repository::{IdentityRepository, SessionRepository};

use crate::error::ApiError;

type Service<I, S> = State<Arc<AuthService<I, S>>>;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Clients may also send their current `access_token`; it is ignored.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// `POST /auth/login`
pub async fn login<I, S>(
    State(service): Service<I, S>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError>
where
    I: IdentityRepository,
    S: SessionRepository,
{
    let Json(body) = payload?;
    let pair = service
        .login(LoginInput {
            email: body.email,
            password: body.password,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(pair.into())))
}

/// `POST /auth/refresh`
pub async fn refresh<I, S>(
    State(service): Service<I, S>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError>
where
    I: IdentityRepository,
    S: SessionRepository,
{
    let Json(body) = payload?;
    let pair = service
        .refresh(RefreshInput {
            refresh_token: body.refresh_token,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(pair.into())))
}

/// `POST /auth/validate`
pub async fn validate<I, S>(
    State(service): Service<I, S>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>, ApiError>
where
    I: IdentityRepository,
    S: SessionRepository,
{
    let Json(body) = payload?;
    let out = service.validate(&body.access_token);
    Ok(Json(ValidateResponse {
        valid: out.valid,
        subject: out.subject,
    }))
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
