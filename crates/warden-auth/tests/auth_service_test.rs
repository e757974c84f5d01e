//! Integration tests for the authentication service.

use std::sync::Arc;
use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use warden_auth::config::AuthConfig;
use warden_auth::password;
use warden_auth::service::{AuthService, LoginInput, RefreshInput, TokenPair};
use warden_auth::token::{self, TokenClass};
use warden_auth::{AuthError, TokenError};
use warden_core::error::WardenResult;
use warden_core::models::identity::{CreateIdentity, Identity};
use warden_core::models::session::{PutSession, RotateSession, Session};
use warden_core::repository::{IdentityRepository, SessionRepository};
use warden_db::repository::{SurrealIdentityRepository, SurrealSessionRepository};

const EMAIL: &str = "a@x.com";
const PASSWORD: &str = "p";

type Service = AuthService<SurrealIdentityRepository<Db>, SurrealSessionRepository<Db>>;

fn test_config() -> AuthConfig {
    AuthConfig {
        access_token_secret: "test-access-secret".into(),
        refresh_token_secret: "test-refresh-secret".into(),
        ..Default::default()
    }
}

/// Spin up in-memory DB, run migrations, create one identity.
async fn setup() -> (Surreal<Db>, Identity) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();

    let identity = SurrealIdentityRepository::new(db.clone())
        .create(CreateIdentity {
            email: EMAIL.into(),
            password_hash: password::hash_password(PASSWORD, None).unwrap(),
        })
        .await
        .unwrap();

    (db, identity)
}

fn service(db: &Surreal<Db>, config: AuthConfig) -> Service {
    AuthService::new(
        SurrealIdentityRepository::new(db.clone()),
        SurrealSessionRepository::new(db.clone()),
        config,
    )
    .unwrap()
}

async fn login(svc: &Service) -> TokenPair {
    svc.login(LoginInput {
        email: EMAIL.into(),
        password: PASSWORD.into(),
    })
    .await
    .unwrap()
}

async fn refresh(svc: &Service, refresh_token: &str) -> Result<TokenPair, AuthError> {
    svc.refresh(RefreshInput {
        refresh_token: refresh_token.into(),
    })
    .await
}

// -----------------------------------------------------------------------
// Login
// -----------------------------------------------------------------------

#[tokio::test]
async fn login_happy_path() {
    let (db, identity) = setup().await;
    let svc = service(&db, test_config());

    let pair = login(&svc).await;

    assert!(!pair.access_token.is_empty());
    assert!(!pair.refresh_token.is_empty());
    assert_ne!(pair.access_token, pair.refresh_token);
    assert_eq!(pair.expires_in, 900);

    let claims = svc
        .codec()
        .parse(&pair.access_token, TokenClass::Access)
        .unwrap();
    assert_eq!(claims.sub, identity.id.to_string());
}

#[tokio::test]
async fn expires_in_follows_access_lifetime() {
    let (db, _) = setup().await;
    let svc = service(
        &db,
        AuthConfig {
            access_token_lifetime_secs: 60,
            ..test_config()
        },
    );

    assert_eq!(login(&svc).await.expires_in, 60);
}

#[tokio::test]
async fn login_persists_refresh_token_digest() {
    let (db, identity) = setup().await;
    let svc = service(&db, test_config());

    let pair = login(&svc).await;

    let session = SurrealSessionRepository::new(db.clone())
        .get(&identity.subject())
        .await
        .unwrap();
    assert_eq!(session.token_hash, token::hash_refresh_token(&pair.refresh_token));
    assert_ne!(session.token_hash, pair.refresh_token);
}

#[tokio::test]
async fn login_wrong_password() {
    let (db, _) = setup().await;
    let svc = service(&db, test_config());

    let err = svc
        .login(LoginInput {
            email: EMAIL.into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();

    assert!(
        matches!(err, AuthError::InvalidCredentials),
        "expected InvalidCredentials, got: {err:?}"
    );
}

#[tokio::test]
async fn login_identity_not_found() {
    let (db, _) = setup().await;
    let svc = service(&db, test_config());

    let err = svc
        .login(LoginInput {
            email: "nobody@x.com".into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::IdentityNotFound), "got: {err:?}");
}

#[tokio::test]
async fn login_blocked_identity() {
    let (db, identity) = setup().await;
    SurrealIdentityRepository::new(db.clone())
        .set_blocked(identity.id, true)
        .await
        .unwrap();
    let svc = service(&db, test_config());

    let err = svc
        .login(LoginInput {
            email: EMAIL.into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::AccountBlocked), "got: {err:?}");
}

#[tokio::test]
async fn login_with_pepper() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();
    SurrealIdentityRepository::new(db.clone())
        .create(CreateIdentity {
            email: EMAIL.into(),
            password_hash: password::hash_password(PASSWORD, Some("pepper!")).unwrap(),
        })
        .await
        .unwrap();

    let peppered = service(
        &db,
        AuthConfig {
            pepper: Some("pepper!".into()),
            ..test_config()
        },
    );
    login(&peppered).await;

    let unpeppered = service(&db, test_config());
    let err = unpeppered
        .login(LoginInput {
            email: EMAIL.into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials), "got: {err:?}");
}

// -----------------------------------------------------------------------
// Session supersession and rotation
// -----------------------------------------------------------------------

#[tokio::test]
async fn second_login_supersedes_first_session() {
    let (db, _) = setup().await;
    let svc = service(&db, test_config());

    let first = login(&svc).await;
    let second = login(&svc).await;
    assert_ne!(first.refresh_token, second.refresh_token);

    let err = refresh(&svc, &first.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefreshToken), "got: {err:?}");

    refresh(&svc, &second.refresh_token).await.unwrap();
}

#[tokio::test]
async fn superseded_session_access_token_stays_valid() {
    let (db, _) = setup().await;
    let svc = service(&db, test_config());

    let first = login(&svc).await;
    login(&svc).await;

    assert!(svc.validate(&first.access_token).valid);
}

#[tokio::test]
async fn refresh_happy_path() {
    let (db, identity) = setup().await;
    let svc = service(&db, test_config());

    let login_out = login(&svc).await;
    let refresh_out = refresh(&svc, &login_out.refresh_token).await.unwrap();

    assert_ne!(refresh_out.refresh_token, login_out.refresh_token);
    assert_ne!(refresh_out.access_token, login_out.access_token);

    let validated = svc.validate(&refresh_out.access_token);
    assert!(validated.valid);
    assert_eq!(validated.subject, Some(identity.id.to_string()));
}

#[tokio::test]
async fn refresh_persists_new_token() {
    let (db, identity) = setup().await;
    let svc = service(&db, test_config());

    let login_out = login(&svc).await;
    let refresh_out = refresh(&svc, &login_out.refresh_token).await.unwrap();

    let session = SurrealSessionRepository::new(db.clone())
        .get(&identity.subject())
        .await
        .unwrap();
    assert_eq!(
        session.token_hash,
        token::hash_refresh_token(&refresh_out.refresh_token)
    );
}

#[tokio::test]
async fn refresh_replay_fails() {
    let (db, _) = setup().await;
    let svc = service(&db, test_config());

    let login_out = login(&svc).await;

    // First refresh succeeds, second use of the same token fails.
    refresh(&svc, &login_out.refresh_token).await.unwrap();
    let err = refresh(&svc, &login_out.refresh_token).await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidRefreshToken), "got: {err:?}");
}

#[tokio::test]
async fn rotation_chain_survives_repeated_refresh() {
    let (db, _) = setup().await;
    let svc = service(&db, test_config());

    let mut current = login(&svc).await.refresh_token;
    let mut superseded = Vec::new();
    for _ in 0..3 {
        let next = refresh(&svc, &current).await.unwrap().refresh_token;
        superseded.push(std::mem::replace(&mut current, next));
    }

    for old in &superseded {
        assert!(refresh(&svc, old).await.is_err());
    }
    refresh(&svc, &current).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refresh_with_same_token_has_one_winner() {
    let (db, _) = setup().await;
    let svc = Arc::new(service(&db, test_config()));

    for round in 0..10 {
        let token = login(&svc).await.refresh_token;

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let svc = Arc::clone(&svc);
                let token = token.clone();
                tokio::spawn(async move {
                    svc.refresh(RefreshInput {
                        refresh_token: token,
                    })
                    .await
                })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => winners += 1,
                Err(AuthError::InvalidRefreshToken) => {}
                Err(e) => panic!("round {round}: loser must see InvalidRefreshToken, got {e:?}"),
            }
        }
        assert_eq!(winners, 1, "round {round}: exactly one refresh should win");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logins_all_succeed_and_one_session_survives() {
    let (db, identity) = setup().await;
    let svc = Arc::new(service(&db, test_config()));

    for round in 0..5 {
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move {
                    svc.login(LoginInput {
                        email: EMAIL.into(),
                        password: PASSWORD.into(),
                    })
                    .await
                })
            })
            .collect();

        let mut pairs = Vec::new();
        for task in tasks {
            match task.await.unwrap() {
                Ok(pair) => pairs.push(pair),
                Err(e) => panic!("round {round}: concurrent login failed: {e:?}"),
            }
        }

        let session = SurrealSessionRepository::new(db.clone())
            .get(&identity.subject())
            .await
            .unwrap();
        assert!(
            pairs
                .iter()
                .any(|p| token::hash_refresh_token(&p.refresh_token) == session.token_hash),
            "round {round}: stored session must belong to one of the logins"
        );

        let mut refreshed = 0;
        for pair in &pairs {
            if refresh(&svc, &pair.refresh_token).await.is_ok() {
                refreshed += 1;
            }
        }
        assert_eq!(refreshed, 1, "round {round}: exactly one refresh token survives");
    }
}

// -----------------------------------------------------------------------
// Refresh rejections
// -----------------------------------------------------------------------

#[tokio::test]
async fn refresh_invalid_token_fails() {
    let (db, _) = setup().await;
    let svc = service(&db, test_config());

    let err = refresh(&svc, "totally-bogus-token").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefreshToken), "got: {err:?}");
}

#[tokio::test]
async fn refresh_with_access_token_fails() {
    let (db, _) = setup().await;
    let svc = service(&db, test_config());

    let login_out = login(&svc).await;
    let err = refresh(&svc, &login_out.access_token).await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidRefreshToken), "got: {err:?}");
}

#[tokio::test]
async fn refresh_tampered_token_fails() {
    let (db, _) = setup().await;
    let svc = service(&db, test_config());

    let login_out = login(&svc).await;
    let mut tampered = login_out.refresh_token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    let err = refresh(&svc, &tampered).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefreshToken), "got: {err:?}");
}

#[tokio::test]
async fn refresh_expired_token_fails() {
    let (db, _) = setup().await;
    let svc = service(
        &db,
        AuthConfig {
            refresh_token_lifetime_secs: 0,
            ..test_config()
        },
    );

    let login_out = login(&svc).await;
    let err = refresh(&svc, &login_out.refresh_token).await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidRefreshToken), "got: {err:?}");
}

#[tokio::test]
async fn refresh_without_session_fails() {
    let (db, identity) = setup().await;
    let svc = service(&db, test_config());

    // Correctly signed, but never persisted by a login.
    let orphan = svc
        .codec()
        .issue(&identity.subject(), TokenClass::Refresh)
        .unwrap();
    let err = refresh(&svc, &orphan.token).await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidRefreshToken), "got: {err:?}");
}

// -----------------------------------------------------------------------
// Validate
// -----------------------------------------------------------------------

#[tokio::test]
async fn validate_issued_access_token() {
    let (db, identity) = setup().await;
    let svc = service(&db, test_config());

    let issued = svc
        .codec()
        .issue(&identity.subject(), TokenClass::Access)
        .unwrap();
    let out = svc.validate(&issued.token);

    assert!(out.valid);
    assert_eq!(out.subject, Some(identity.subject()));
}

#[tokio::test]
async fn validate_rejects_without_failing() {
    let (db, _) = setup().await;
    let svc = service(&db, test_config());
    let pair = login(&svc).await;

    for token in ["", "garbage", pair.refresh_token.as_str()] {
        let out = svc.validate(token);
        assert!(!out.valid, "{token:?} should be invalid");
        assert_eq!(out.subject, None);
    }

    let tampered = format!("{}x", pair.access_token);
    assert!(!svc.validate(&tampered).valid);
}

#[tokio::test]
async fn validate_rejects_expired_access_token() {
    let (db, _) = setup().await;
    let svc = service(
        &db,
        AuthConfig {
            access_token_lifetime_secs: 0,
            ..test_config()
        },
    );

    let pair = login(&svc).await;
    assert!(!svc.validate(&pair.access_token).valid);
}

// -----------------------------------------------------------------------
// Construction and store failures
// -----------------------------------------------------------------------

#[tokio::test]
async fn new_rejects_shared_secrets() {
    let (db, _) = setup().await;

    let result = AuthService::new(
        SurrealIdentityRepository::new(db.clone()),
        SurrealSessionRepository::new(db.clone()),
        AuthConfig {
            access_token_secret: "same".into(),
            refresh_token_secret: "same".into(),
            ..Default::default()
        },
    );

    assert!(matches!(result, Err(AuthError::Config(_))));
}

/// Session store that never answers in time.
struct StalledSessions;

impl SessionRepository for StalledSessions {
    async fn put(&self, _input: PutSession) -> WardenResult<Session> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        unreachable!("the deadline fires first")
    }

    async fn get(&self, _subject: &str) -> WardenResult<Session> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        unreachable!("the deadline fires first")
    }

    async fn rotate(&self, _input: RotateSession) -> WardenResult<Session> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        unreachable!("the deadline fires first")
    }
}

#[tokio::test]
async fn stalled_session_store_is_a_storage_error() {
    let (db, _) = setup().await;
    let svc = AuthService::new(
        SurrealIdentityRepository::new(db.clone()),
        StalledSessions,
        AuthConfig {
            store_timeout_ms: 250,
            ..test_config()
        },
    )
    .unwrap();

    let err = svc
        .login(LoginInput {
            email: EMAIL.into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Storage(_)), "got: {err:?}");

    let orphan = svc.codec().issue("s", TokenClass::Refresh).unwrap();
    let err = svc
        .refresh(RefreshInput {
            refresh_token: orphan.token,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Storage(_)), "got: {err:?}");
}

#[test]
fn token_errors_are_distinct() {
    assert_ne!(TokenError::Malformed, TokenError::BadSignature);
    assert_ne!(TokenError::Expired, TokenError::WrongClass);
}
