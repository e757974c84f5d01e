//! Warden Auth: password verification, signed access/refresh token
//! issuance and parsing, and the login / refresh / validate flows.

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::{AuthError, TokenError};
pub use service::{AuthService, LoginInput, RefreshInput, TokenPair, ValidateOutput};
pub use token::{TokenClaims, TokenClass, TokenCodec};
