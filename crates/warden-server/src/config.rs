//! Server settings.
//!
//! Loaded with figment: built-in defaults, then `warden.toml`, then
//! `WARDEN_`-prefixed environment variables. Nested keys use `__`, e.g.
//! `WARDEN_AUTH__ACCESS_TOKEN_SECRET`.

use std::net::SocketAddr;
use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use warden_auth::AuthConfig;
use warden_db::DbConfig;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "warden.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Application settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub auth: AuthConfig,
    pub db: DbConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_filter: "warden=info,tower_http=info".into(),
            auth: AuthConfig::default(),
            db: DbConfig::default(),
        }
    }
}

impl Settings {
    /// Load from `path` (if it exists) and the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed("WARDEN_").split("__")),
        )
    }

    /// Extract and validate settings from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.access_token_secret.is_empty() || self.auth.refresh_token_secret.is_empty()
        {
            return Err(ConfigError::Invalid(
                "auth.access_token_secret and auth.refresh_token_secret must be set".into(),
            ));
        }
        if self.auth.access_token_secret == self.auth.refresh_token_secret {
            return Err(ConfigError::Invalid(
                "access and refresh token secrets must differ".into(),
            ));
        }
        if self.auth.store_timeout_ms == 0 || self.db.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "auth.store_timeout_ms and db.connect_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
