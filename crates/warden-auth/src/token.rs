//! Signed access/refresh token issuance and parsing.
//!
//! Tokens are HS256 JWTs. Each [`TokenClass`] is bound to its own
//! secret and the class is carried both in the header `kid` and in the
//! claims, so an access token can never be accepted as a refresh token
//! or the other way around.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, TokenError};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Which secret a token is signed with and what it may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    /// Name used in the header `kid` and the `class` claim.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenClass::Access => "access",
            TokenClass::Refresh => "refresh",
        }
    }

    fn other(self) -> Self {
        match self {
            TokenClass::Access => TokenClass::Refresh,
            TokenClass::Refresh => TokenClass::Access,
        }
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims embedded in every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: identity ID (UUID string).
    pub sub: String,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
    /// Token class.
    pub class: TokenClass,
}

/// A freshly signed token together with what went into it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
    pub expires_at: DateTime<Utc>,
}

struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl ClassKeys {
    fn new(secret: &str, lifetime_secs: u64, class: TokenClass) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Config(format!("{class} token secret is empty")));
        }
        let lifetime = i64::try_from(lifetime_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| AuthError::Config(format!("{class} token lifetime out of range")))?;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        })
    }
}

/// Issues and parses tokens with class-bound secrets.
///
/// Secrets are injected through [`AuthConfig`]; separate codec
/// instances share nothing.
pub struct TokenCodec {
    access: ClassKeys,
    refresh: ClassKeys,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_lifetime", &self.access.lifetime)
            .field("refresh_lifetime", &self.refresh.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from the configured secrets and lifetimes.
    ///
    /// Fails if either secret is empty or both secrets are equal.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.access_token_secret == config.refresh_token_secret {
            return Err(AuthError::Config(
                "access and refresh token secrets must differ".into(),
            ));
        }

        let access = ClassKeys::new(
            &config.access_token_secret,
            config.access_token_lifetime_secs,
            TokenClass::Access,
        )?;
        let refresh = ClassKeys::new(
            &config.refresh_token_secret,
            config.refresh_token_lifetime_secs,
            TokenClass::Refresh,
        )?;

        // Expiry is checked by `parse_at` against an explicit clock with
        // no leeway.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Ok(Self {
            access,
            refresh,
            validation,
        })
    }

    fn keys(&self, class: TokenClass) -> &ClassKeys {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    /// Lifetime of tokens of the given class.
    pub fn lifetime(&self, class: TokenClass) -> Duration {
        self.keys(class).lifetime
    }

    /// Issue a token for `subject` that expires one lifetime from now.
    pub fn issue(&self, subject: &str, class: TokenClass) -> Result<IssuedToken, AuthError> {
        self.issue_at(subject, class, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        subject: &str,
        class: TokenClass,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let keys = self.keys(class);
        let expires_at = now + keys.lifetime;
        let claims = TokenClaims {
            sub: subject.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            class,
        };

        let mut header = Header::new(ALGORITHM);
        header.kid = Some(class.as_str().to_string());

        let token = jsonwebtoken::encode(&header, &claims, &keys.encoding)
            .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))?;

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
        })
    }

    /// Verify `token` as a token of `expected` class against the wall
    /// clock.
    pub fn parse(&self, token: &str, expected: TokenClass) -> Result<TokenClaims, TokenError> {
        self.parse_at(token, expected, Utc::now())
    }

    /// Verify `token` as a token of `expected` class as if the current
    /// time were `now`. A token whose `exp` equals `now` is expired.
    pub fn parse_at(
        &self,
        token: &str,
        expected: TokenClass,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, TokenError> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| TokenError::Malformed)?;

        if header.alg != ALGORITHM {
            return Err(TokenError::Malformed);
        }

        match header.kid.as_deref() {
            None => {}
            Some(kid) if kid == expected.as_str() => {}
            Some(kid) if kid == expected.other().as_str() => return Err(TokenError::WrongClass),
            Some(_) => return Err(TokenError::Malformed),
        }

        let claims = jsonwebtoken::decode::<TokenClaims>(
            token,
            &self.keys(expected).decoding,
            &self.validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        })?;

        if claims.class != expected {
            return Err(TokenError::WrongClass);
        }

        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

/// SHA-256 hash of a raw refresh token, hex-encoded.
///
/// This is the value stored as `session.token_hash`; equal digests
/// mean equal token strings.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
