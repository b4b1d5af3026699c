//! Integration tests for the session authority.

use chrono::{Duration, Utc};
use notype_auth::config::SessionConfig;
use notype_auth::cookie::CookiePolicy;
use notype_auth::session::SessionAuthority;
use notype_auth::token::{TokenGenerator, hash_session_token};
use notype_core::error::NotypeError;
use notype_core::models::account::{CreateAccount, Preferences};
use notype_core::models::session::CreateSession;
use notype_core::repository::{AccountRepository, SessionRepository};
use notype_db::repository::{SurrealAccountRepository, SurrealSessionRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Authority = SessionAuthority<SurrealAccountRepository<Db>, SurrealSessionRepository<Db>>;

struct Harness {
    authority: Authority,
    sessions: SurrealSessionRepository<Db>,
    account_id: Uuid,
    db: Surreal<Db>,
}

async fn setup_with(config: SessionConfig) -> Harness {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    notype_db::run_migrations(&db).await.unwrap();

    let accounts = SurrealAccountRepository::new(db.clone());
    let account = accounts
        .create(CreateAccount {
            email: "ann@example.com".into(),
            federated_id: None,
            display_name: "Ann".into(),
            credential_hash: None,
            avatar_url: "https://www.gravatar.com/avatar/abc?d=identicon".into(),
            preferences: Preferences::default(),
        })
        .await
        .unwrap();

    let sessions = SurrealSessionRepository::new(db.clone());
    let authority = SessionAuthority::new(
        accounts,
        sessions.clone(),
        config,
        CookiePolicy::cross_site(Some("api.example.com".into())),
    );

    Harness {
        authority,
        sessions,
        account_id: account.id,
        db,
    }
}

async fn setup() -> Harness {
    setup_with(SessionConfig::default()).await
}

#[tokio::test]
async fn issue_then_validate_returns_account() {
    let h = setup().await;

    let issued = h.authority.issue(h.account_id).await.unwrap();
    assert!(issued.token.len() >= 22);
    assert!(!issued.token.contains(&h.account_id.to_string()));
    assert!(issued.set_cookie.starts_with(&format!("notype.sid={};", issued.token)));
    assert!(issued.set_cookie.contains("HttpOnly"));
    assert!(issued.set_cookie.contains("Max-Age=86400"));

    let lifetime = issued.expires_at - Utc::now();
    assert!(lifetime > Duration::hours(23) && lifetime <= Duration::hours(24));

    let account = h.authority.validate(&issued.token).await.unwrap().unwrap();
    assert_eq!(account.id, h.account_id);
}

#[tokio::test]
async fn only_the_hash_is_stored() {
    let h = setup().await;
    let issued = h.authority.issue(h.account_id).await.unwrap();

    let stored = h
        .sessions
        .get_by_token_hash(&hash_session_token(&issued.token))
        .await
        .unwrap();
    assert_eq!(stored.id, issued.session_id);
    assert_ne!(stored.token_hash, issued.token);
}

#[tokio::test]
async fn tokens_are_unique_per_issue() {
    let h = setup().await;
    let a = h.authority.issue(h.account_id).await.unwrap();
    let b = h.authority.issue(h.account_id).await.unwrap();
    assert_ne!(a.token, b.token);
    assert_ne!(a.session_id, b.session_id);
}

#[tokio::test]
async fn unknown_token_is_no_identity() {
    let h = setup().await;
    assert!(h.authority.validate("never-issued").await.unwrap().is_none());
    assert!(h.authority.validate("").await.unwrap().is_none());
}

#[tokio::test]
async fn destroy_ends_session_and_is_idempotent() {
    let h = setup().await;
    let issued = h.authority.issue(h.account_id).await.unwrap();

    let clear = h.authority.destroy(&issued.token).await.unwrap();
    assert!(clear.contains("Max-Age=0"));
    assert!(clear.contains("Domain=api.example.com"));
    assert!(h.authority.validate(&issued.token).await.unwrap().is_none());

    // Second destroy of the same token is fine.
    h.authority.destroy(&issued.token).await.unwrap();
}

#[tokio::test]
async fn expired_session_is_no_identity_before_sweep() {
    let h = setup().await;
    let token = notype_auth::token::RandomTokenGenerator.generate();
    h.sessions
        .create(CreateSession {
            account_id: h.account_id,
            token_hash: hash_session_token(&token),
            expires_at: Utc::now() - Duration::seconds(1),
        })
        .await
        .unwrap();

    assert!(h.authority.validate(&token).await.unwrap().is_none());

    // Validation does not sweep; the record is still there.
    assert!(
        h.sessions
            .get_by_token_hash(&hash_session_token(&token))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn purge_removes_only_expired_sessions() {
    let h = setup().await;
    let live = h.authority.issue(h.account_id).await.unwrap();
    for i in 0..3 {
        h.sessions
            .create(CreateSession {
                account_id: h.account_id,
                token_hash: hash_session_token(&format!("stale-{i}")),
                expires_at: Utc::now() - Duration::minutes(5),
            })
            .await
            .unwrap();
    }

    assert_eq!(h.authority.purge_expired().await.unwrap(), 3);
    assert_eq!(h.authority.purge_expired().await.unwrap(), 0);
    assert!(h.authority.validate(&live.token).await.unwrap().is_some());
}

#[tokio::test]
async fn require_maps_missing_session_to_not_authenticated() {
    let h = setup().await;
    let issued = h.authority.issue(h.account_id).await.unwrap();

    let account = h.authority.require(Some(&issued.token)).await.unwrap();
    assert_eq!(account.id, h.account_id);

    for token in [None, Some("bogus")] {
        let err = h.authority.require(token).await.unwrap_err();
        assert!(matches!(err, NotypeError::NotAuthenticated));
        assert_eq!(err.status_code(), 401);
    }
}

#[tokio::test]
async fn destroy_all_ends_every_session_of_account() {
    let h = setup().await;
    let a = h.authority.issue(h.account_id).await.unwrap();
    let b = h.authority.issue(h.account_id).await.unwrap();

    h.authority.destroy_all(h.account_id).await.unwrap();

    assert!(h.authority.validate(&a.token).await.unwrap().is_none());
    assert!(h.authority.validate(&b.token).await.unwrap().is_none());
}

#[tokio::test]
async fn session_of_deleted_account_is_no_identity() {
    let h = setup().await;
    let issued = h.authority.issue(h.account_id).await.unwrap();

    h.db.query("DELETE account").await.unwrap().check().unwrap();

    assert!(h.authority.validate(&issued.token).await.unwrap().is_none());
}

#[tokio::test]
async fn sliding_expiration_extends_on_validate() {
    let h = setup_with(SessionConfig {
        ttl_secs: 3_600,
        sliding_expiration: true,
    })
    .await;
    let issued = h.authority.issue(h.account_id).await.unwrap();

    // Pull the expiry close so the extension is observable.
    h.sessions
        .touch(issued.session_id, Utc::now() + Duration::seconds(30))
        .await
        .unwrap();

    h.authority.validate(&issued.token).await.unwrap().unwrap();

    let stored = h
        .sessions
        .get_by_token_hash(&hash_session_token(&issued.token))
        .await
        .unwrap();
    assert!(stored.expires_at - Utc::now() > Duration::minutes(50));
}

#[tokio::test]
async fn fixed_expiration_is_left_alone() {
    let h = setup().await;
    let issued = h.authority.issue(h.account_id).await.unwrap();
    let before = Utc::now() + Duration::seconds(30);
    h.sessions.touch(issued.session_id, before).await.unwrap();

    h.authority.validate(&issued.token).await.unwrap().unwrap();

    let stored = h
        .sessions
        .get_by_token_hash(&hash_session_token(&issued.token))
        .await
        .unwrap();
    assert!(stored.expires_at - Utc::now() <= Duration::seconds(30));
}
