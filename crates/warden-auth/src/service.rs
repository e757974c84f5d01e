//! Authentication service: login, refresh and validate orchestration.

use std::time::Duration;

use tracing::{debug, error, info, warn};
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::session::{PutSession, RotateSession};
use warden_core::repository::{IdentityRepository, SessionRepository};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token::{self, IssuedToken, TokenClass, TokenCodec};

/// Plaintext verified against when the email is unknown, so a missing
/// identity costs the same Argon2id run as a wrong password.
const TIMING_EQUALIZER: &str = "warden-timing-equalizer";

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Input for the refresh token rotation flow.
#[derive(Debug)]
pub struct RefreshInput {
    pub refresh_token: String,
}

/// Token pair returned by login and refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Signed access token.
    pub access_token: String,
    /// Signed refresh token; the only one the session store accepts
    /// for this subject from now on.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Result of validating an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOutput {
    pub valid: bool,
    pub subject: Option<String>,
}

impl ValidateOutput {
    fn invalid() -> Self {
        Self {
            valid: false,
            subject: None,
        }
    }
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate. Holds no mutable state of
/// its own; per-subject consistency is delegated to the session store.
pub struct AuthService<I: IdentityRepository, S: SessionRepository> {
    identity_repo: I,
    session_repo: S,
    codec: TokenCodec,
    config: AuthConfig,
    dummy_hash: String,
}

impl<I: IdentityRepository, S: SessionRepository> AuthService<I, S> {
    /// Build the service. Fails on invalid signing configuration.
    pub fn new(identity_repo: I, session_repo: S, config: AuthConfig) -> Result<Self, AuthError> {
        let codec = TokenCodec::new(&config)?;
        let dummy_hash = password::hash_password(TIMING_EQUALIZER, config.pepper.as_deref())?;

        Ok(Self {
            identity_repo,
            session_repo,
            codec,
            config,
            dummy_hash,
        })
    }

    /// The token codec, for services that verify tokens themselves.
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Argon2id verification on the blocking pool, off the async
    /// workers.
    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        let pepper = self.config.pepper.clone();
        tokio::task::spawn_blocking(move || {
            password::verify_password(&password, &hash, pepper.as_deref())
        })
        .await
        .map_err(|e| AuthError::Crypto(format!("verify task: {e}")))?
    }

    /// Run one store round trip under the configured deadline.
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = WardenResult<T>>,
    ) -> WardenResult<T> {
        let deadline = Duration::from_millis(self.config.store_timeout_ms);
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(WardenError::Database(format!("{op} timed out"))),
        }
    }

    /// Authenticate with email + password and issue a token pair.
    ///
    /// The new refresh token replaces any session the identity already
    /// had; earlier refresh tokens stop working, earlier access tokens
    /// keep working until they expire.
    pub async fn login(&self, input: LoginInput) -> Result<TokenPair, AuthError> {
        // 1. Look up identity.
        let identity = match self
            .bounded("identity lookup", self.identity_repo.get_by_email(&input.email))
            .await
        {
            Ok(identity) => identity,
            Err(e) if e.is_not_found() => {
                let _ = self.verify(&input.password, &self.dummy_hash).await;
                warn!(email = %input.email, "login rejected: identity not found");
                return Err(AuthError::IdentityNotFound);
            }
            Err(e) => return Err(storage_error("identity lookup", e)),
        };

        // 2. Verify password.
        let valid = self
            .verify(&input.password, &identity.password_hash)
            .await
            .inspect_err(|e| {
                error!(identity_id = %identity.id, error = %e, "stored credential hash unusable");
            })?;

        if !valid {
            warn!(identity_id = %identity.id, "login rejected: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }

        // 3. Check account status.
        if identity.is_blocked {
            warn!(identity_id = %identity.id, "login rejected: account blocked");
            return Err(AuthError::AccountBlocked);
        }

        // 4. Issue tokens.
        let subject = identity.subject();
        let access = self.codec.issue(&subject, TokenClass::Access)?;
        let refresh = self.codec.issue(&subject, TokenClass::Refresh)?;

        // 5. Supersede any previous session.
        self.bounded(
            "session put",
            self.session_repo.put(PutSession {
                subject: subject.clone(),
                token_hash: token::hash_refresh_token(&refresh.token),
                expires_at: refresh.expires_at,
            }),
        )
        .await
        .map_err(|e| storage_error("session put", e))?;

        info!(subject = %subject, "login succeeded");
        Ok(self.pair(access, refresh))
    }

    /// Exchange the subject's current refresh token for a new pair.
    ///
    /// The presented token must be the exact one the session store
    /// holds. The new refresh token is persisted before returning, so
    /// every refresh token is single-use and the rotation chain can be
    /// followed indefinitely.
    pub async fn refresh(&self, input: RefreshInput) -> Result<TokenPair, AuthError> {
        // 1. Verify signature, class and expiry.
        let claims = self
            .codec
            .parse(&input.refresh_token, TokenClass::Refresh)
            .map_err(|e| {
                warn!(reason = %e, "refresh rejected: token did not verify");
                AuthError::InvalidRefreshToken
            })?;
        let subject = claims.sub;

        // 2. Load the subject's session.
        let session = match self
            .bounded("session lookup", self.session_repo.get(&subject))
            .await
        {
            Ok(session) => session,
            Err(e) if e.is_not_found() => {
                warn!(subject = %subject, "refresh rejected: no session");
                return Err(AuthError::InvalidRefreshToken);
            }
            Err(e) => return Err(storage_error("session lookup", e)),
        };

        // 3. Rotation check: only the latest refresh token is accepted.
        let presented_hash = token::hash_refresh_token(&input.refresh_token);
        if session.token_hash != presented_hash {
            warn!(subject = %subject, "refresh rejected: token superseded");
            return Err(AuthError::InvalidRefreshToken);
        }

        // 4. Issue the new pair.
        let access = self.codec.issue(&subject, TokenClass::Access)?;
        let refresh = self.codec.issue(&subject, TokenClass::Refresh)?;

        // 5. Persist the new refresh token, unless a concurrent login or
        //    refresh replaced the session since step 2.
        match self
            .bounded(
                "session rotate",
                self.session_repo.rotate(RotateSession {
                    subject: subject.clone(),
                    current_token_hash: presented_hash,
                    token_hash: token::hash_refresh_token(&refresh.token),
                    expires_at: refresh.expires_at,
                }),
            )
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                warn!(subject = %subject, "refresh rejected: session changed concurrently");
                return Err(AuthError::InvalidRefreshToken);
            }
            Err(e) => return Err(storage_error("session rotate", e)),
        }

        info!(subject = %subject, "refresh succeeded");
        Ok(self.pair(access, refresh))
    }

    /// Check an access token. Never fails: any rejection is
    /// `valid: false`.
    pub fn validate(&self, access_token: &str) -> ValidateOutput {
        match self.codec.parse(access_token, TokenClass::Access) {
            Ok(claims) => ValidateOutput {
                valid: true,
                subject: Some(claims.sub),
            },
            Err(e) => {
                debug!(reason = %e, "access token rejected");
                ValidateOutput::invalid()
            }
        }
    }

    fn pair(&self, access: IssuedToken, refresh: IssuedToken) -> TokenPair {
        TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: self
                .codec
                .lifetime(TokenClass::Access)
                .num_seconds()
                .unsigned_abs(),
        }
    }
}

fn storage_error(op: &'static str, err: WardenError) -> AuthError {
    error!(op, error = %err, "store call failed");
    AuthError::Storage(err.to_string())
}
