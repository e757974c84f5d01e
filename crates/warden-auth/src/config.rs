//! Authentication configuration.

use serde::Deserialize;

/// Configuration for the authentication service.
///
/// Deserializable so the server can read it straight from its settings
/// file; missing keys fall back to [`Default`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC-SHA256 secret for access tokens.
    pub access_token_secret: String,
    /// HMAC-SHA256 secret for refresh tokens. Must differ from the
    /// access secret so a token cannot be replayed across classes.
    pub refresh_token_secret: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 604_800 = 7 days).
    pub refresh_token_lifetime_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id hashing
    /// and verification.
    pub pepper: Option<String>,
    /// Upper bound for each identity-directory or session-store round
    /// trip, in milliseconds (default: 5000).
    pub store_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: String::new(),
            refresh_token_secret: String::new(),
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_secs: 604_800,
            pepper: None,
            store_timeout_ms: 5_000,
        }
    }
}
