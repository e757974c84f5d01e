//! Authentication error types.

use thiserror::Error;

/// Why a token was rejected by the codec.
///
/// Variants are distinct so callers can log or alert on them; the
/// orchestrator collapses all of them before they leave the subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token belongs to a different class")]
    WrongClass,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("identity not found")]
    IdentityNotFound,

    #[error("account is blocked")]
    AccountBlocked,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("configuration error: {0}")]
    Config(String),
}
