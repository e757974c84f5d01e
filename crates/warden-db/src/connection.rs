//! Connecting to the identity and session store.
//!
//! [`DbManager::connect`] opens the WebSocket client, signs in as root,
//! selects the namespace and database and applies pending migrations,
//! all under one deadline. A manager that exists is ready to serve.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::repository::{SurrealIdentityRepository, SurrealSessionRepository};
use crate::schema::run_migrations;

/// Where the store lives and how long to wait for it.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// WebSocket address, e.g. `127.0.0.1:8000`.
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Deadline for connect, sign-in and migrations together.
    pub connect_timeout_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "warden".into(),
            database: "auth".into(),
            username: "root".into(),
            password: "root".into(),
            connect_timeout_ms: 5_000,
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}

/// A migrated connection and the repositories built on it.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Connect and bring the schema up to date, failing with
    /// [`DbError::Timeout`] if that takes longer than
    /// `connect_timeout_ms`.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let deadline = Duration::from_millis(config.connect_timeout_ms);
        let db = tokio::time::timeout(deadline, open(config))
            .await
            .map_err(|_| DbError::Timeout {
                op: "connect",
                after_ms: config.connect_timeout_ms,
            })??;

        info!("SurrealDB ready");
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }

    pub fn identities(&self) -> SurrealIdentityRepository<Client> {
        SurrealIdentityRepository::new(self.db.clone())
    }

    pub fn sessions(&self) -> SurrealSessionRepository<Client> {
        SurrealSessionRepository::new(self.db.clone())
    }
}

async fn open(config: &DbConfig) -> Result<Surreal<Client>, DbError> {
    let db = Surreal::new::<Ws>(&config.url).await?;

    db.signin(Root {
        username: config.username.clone(),
        password: config.password.clone(),
    })
    .await?;

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await?;

    run_migrations(&db).await?;
    Ok(db)
}
