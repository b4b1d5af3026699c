//! Integration tests for the identity resolver.

use std::sync::Arc;
use std::time::Duration;

use notype_auth::config::AuthConfig;
use notype_auth::identity::IdentityResolver;
use notype_core::error::{NotypeError, NotypeResult};
use notype_core::models::account::{FederatedProfile, Preferences, Theme};
use notype_core::provider::ProfileProvider;
use notype_core::repository::AccountRepository;
use notype_db::repository::SurrealAccountRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

/// Cheap Argon2 parameters; production cost makes the suite crawl.
fn test_config() -> AuthConfig {
    AuthConfig {
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        provider_timeout: Duration::from_millis(200),
        ..AuthConfig::default()
    }
}

async fn setup() -> IdentityResolver<SurrealAccountRepository<Db>> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    notype_db::run_migrations(&db).await.unwrap();
    IdentityResolver::with_argon2(SurrealAccountRepository::new(db), test_config()).unwrap()
}

fn profile(external_id: &str, email: Option<&str>) -> FederatedProfile {
    FederatedProfile {
        external_id: external_id.into(),
        email: email.map(Into::into),
        display_name: Some("Ann Lee".into()),
        avatar_url: Some("https://provider.example/ann.png".into()),
    }
}

// ---------------------------------------------------------------------------
// Local credentials
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_then_resolve_normalizes_email_and_name() {
    let resolver = setup().await;

    let registered = resolver
        .register_local("User@Example.com ", "secret1", " Ann ")
        .await
        .unwrap();
    assert_eq!(registered.email, "user@example.com");
    assert_eq!(registered.display_name, "Ann");
    assert!(registered.has_local_credential());
    assert!(registered.federated_id.is_none());

    let resolved = resolver
        .resolve_local("user@example.com", "secret1")
        .await
        .unwrap();
    assert_eq!(resolved.id, registered.id);
    assert_eq!(resolved.email, "user@example.com");
    assert_eq!(resolved.display_name, "Ann");
}

#[tokio::test]
async fn stored_hash_is_not_the_plaintext() {
    let resolver = setup().await;
    let account = resolver
        .register_local("ann@example.com", "secret1", "Ann")
        .await
        .unwrap();

    let hash = account.credential_hash.unwrap();
    assert!(hash.starts_with("$argon2id$"));
    assert!(!hash.contains("secret1"));
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let resolver = setup().await;
    resolver
        .register_local("ann@example.com", "secret1", "Ann")
        .await
        .unwrap();
    resolver
        .resolve_federated(profile("gh-7", Some("fed@example.com")))
        .await
        .unwrap();

    let wrong_secret = resolver
        .resolve_local("ann@example.com", "secret2")
        .await
        .unwrap_err();
    let unknown_email = resolver
        .resolve_local("nobody@example.com", "secret1")
        .await
        .unwrap_err();
    let federated_only = resolver
        .resolve_local("fed@example.com", "secret1")
        .await
        .unwrap_err();

    for err in [&wrong_secret, &unknown_email, &federated_only] {
        assert!(matches!(err, NotypeError::InvalidCredentials), "got {err:?}");
    }
    assert_eq!(wrong_secret.to_string(), unknown_email.to_string());
    assert_eq!(wrong_secret.to_string(), federated_only.to_string());
}

#[tokio::test]
async fn register_validation_failures() {
    let resolver = setup().await;

    let cases = [
        ("not-an-email", "secret1", "Ann"),
        ("ann@example.com", "short", "Ann"),
        ("ann@example.com", "secret1", "   "),
    ];
    for (email, secret, name) in cases {
        let err = resolver.register_local(email, secret, name).await.unwrap_err();
        assert!(
            matches!(err, NotypeError::Validation { .. }),
            "{email}/{secret}/{name:?}: {err:?}"
        );
    }

    // Nothing was created along the way.
    assert!(matches!(
        resolver.accounts().get_by_email("ann@example.com").await,
        Err(NotypeError::NotFound { .. })
    ));
}

#[tokio::test]
async fn register_duplicate_email_in_any_case() {
    let resolver = setup().await;
    resolver
        .register_local("ann@example.com", "secret1", "Ann")
        .await
        .unwrap();

    let err = resolver
        .register_local(" ANN@example.com", "secret2", "Other Ann")
        .await
        .unwrap_err();
    assert!(matches!(err, NotypeError::DuplicateEmail));
}

#[tokio::test]
async fn concurrent_register_yields_one_account() {
    let resolver = setup().await;

    let (a, b) = tokio::join!(
        resolver.register_local("race@example.com", "secret1", "First"),
        resolver.register_local("race@example.com", "secret2", "Second"),
    );

    let outcomes = [a, b];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let duplicates = outcomes
        .iter()
        .filter(|r| matches!(r, Err(NotypeError::DuplicateEmail)))
        .count();
    assert_eq!(successes, 1, "{outcomes:?}");
    assert_eq!(duplicates, 1, "{outcomes:?}");
}

// ---------------------------------------------------------------------------
// Federated profiles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn federated_resolution_creates_once() {
    let resolver = setup().await;

    let first = resolver
        .resolve_federated(profile("gh-1", Some("Ann@Example.com")))
        .await
        .unwrap();
    assert_eq!(first.email, "ann@example.com");
    assert_eq!(first.federated_id.as_deref(), Some("gh-1"));
    assert_eq!(first.display_name, "Ann Lee");
    assert_eq!(first.avatar_url, "https://provider.example/ann.png");
    assert!(!first.has_local_credential());

    // The provider changed its profile; first-seen values stick.
    let mut changed = profile("gh-1", Some("ann@example.com"));
    changed.display_name = Some("Someone Else".into());
    let second = resolver.resolve_federated(changed).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.display_name, "Ann Lee");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_sign_ins_leave_a_usable_account() {
    let resolver = Arc::new(setup().await);

    for i in 0..25 {
        let external_id = format!("gh-race-{i}");
        let email = format!("race{i}@example.com");

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                let p = profile(&external_id, Some(&email));
                tokio::spawn(async move { resolver.resolve_federated(p).await })
            })
            .collect();

        let mut winners = Vec::new();
        for h in handles {
            match h.await.expect("task panicked") {
                Ok(account) => winners.push(account.id),
                Err(NotypeError::Conflict { .. }) => {}
                Err(e) => panic!("round {i}: unexpected {e:?}"),
            }
        }
        assert!(!winners.is_empty(), "round {i}: nobody signed in");
        assert!(winners.iter().all(|id| *id == winners[0]), "round {i}: {winners:?}");

        // Whoever lost, the next sign-in lands on the surviving account.
        let again = resolver
            .resolve_federated(profile(&external_id, Some(&email)))
            .await
            .unwrap_or_else(|e| panic!("round {i}: follow-up sign-in failed: {e:?}"));
        assert_eq!(again.id, winners[0]);
        assert_eq!(again.federated_id.as_deref(), Some(external_id.as_str()));

        let by_email = resolver.accounts().get_by_email(&email).await.unwrap();
        assert_eq!(by_email.id, winners[0]);
    }
}

#[tokio::test]
async fn federated_defaults_name_and_avatar() {
    let resolver = setup().await;

    let account = resolver
        .resolve_federated(FederatedProfile {
            external_id: "gh-2".into(),
            email: Some("bo.lin@example.com".into()),
            display_name: None,
            avatar_url: Some("  ".into()),
        })
        .await
        .unwrap();

    assert_eq!(account.display_name, "Bo.lin");
    assert!(account.avatar_url.starts_with("https://www.gravatar.com/avatar/"));
}

#[tokio::test]
async fn federated_links_existing_local_account() {
    let resolver = setup().await;
    let local = resolver
        .register_local("ann@example.com", "secret1", "Ann")
        .await
        .unwrap();

    let linked = resolver
        .resolve_federated(profile("gh-3", Some("ann@example.com")))
        .await
        .unwrap();

    assert_eq!(linked.id, local.id);
    assert_eq!(linked.federated_id.as_deref(), Some("gh-3"));
    assert_eq!(linked.credential_hash, local.credential_hash);
    assert_eq!(linked.display_name, "Ann");

    // The password still works after linking.
    let again = resolver
        .resolve_local("ann@example.com", "secret1")
        .await
        .unwrap();
    assert_eq!(again.id, local.id);
}

#[tokio::test]
async fn federated_id_is_never_replaced() {
    let resolver = setup().await;
    resolver
        .resolve_federated(profile("gh-4", Some("ann@example.com")))
        .await
        .unwrap();

    let err = resolver
        .resolve_federated(profile("other-4", Some("ann@example.com")))
        .await
        .unwrap_err();
    assert!(matches!(err, NotypeError::Conflict { .. }), "got {err:?}");

    let account = resolver
        .accounts()
        .get_by_email("ann@example.com")
        .await
        .unwrap();
    assert_eq!(account.federated_id.as_deref(), Some("gh-4"));
}

#[tokio::test]
async fn federated_profile_without_email_is_incomplete() {
    let resolver = setup().await;

    for email in [None, Some(""), Some("nonsense")] {
        let err = resolver
            .resolve_federated(profile("gh-5", email))
            .await
            .unwrap_err();
        assert!(matches!(err, NotypeError::IncompleteProfile { .. }), "{email:?}");
    }

    let err = resolver
        .resolve_federated(profile("  ", Some("ann@example.com")))
        .await
        .unwrap_err();
    assert!(matches!(err, NotypeError::IncompleteProfile { .. }));
}

#[tokio::test]
async fn known_federated_id_needs_no_email() {
    let resolver = setup().await;
    let created = resolver
        .resolve_federated(profile("gh-6", Some("ann@example.com")))
        .await
        .unwrap();

    let again = resolver
        .resolve_federated(profile("gh-6", None))
        .await
        .unwrap();
    assert_eq!(again.id, created.id);
}

// ---------------------------------------------------------------------------
// Provider round trip
// ---------------------------------------------------------------------------

struct StaticProvider {
    delay: Duration,
}

impl ProfileProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_profile(&self, handshake: &str) -> NotypeResult<FederatedProfile> {
        tokio::time::sleep(self.delay).await;
        Ok(profile(handshake, Some("provider@example.com")))
    }
}

#[tokio::test]
async fn provider_profile_is_resolved() {
    let resolver = setup().await;
    let provider = StaticProvider {
        delay: Duration::ZERO,
    };

    let account = resolver
        .resolve_with_provider(&provider, "gh-9")
        .await
        .unwrap();
    assert_eq!(account.federated_id.as_deref(), Some("gh-9"));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let resolver = setup().await;
    let provider = StaticProvider {
        delay: Duration::from_secs(5),
    };

    let err = resolver
        .resolve_with_provider(&provider, "gh-10")
        .await
        .unwrap_err();
    assert!(matches!(err, NotypeError::UpstreamTimeout(_)), "got {err:?}");
    assert!(err.is_retryable());
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_preferences_round_trip() {
    let resolver = setup().await;
    let account = resolver
        .register_local("ann@example.com", "secret1", "Ann")
        .await
        .unwrap();
    assert_eq!(account.preferences, Preferences::default());

    let updated = resolver
        .update_preferences(
            account.id,
            Preferences {
                locale: "de".into(),
                theme: Theme::Dark,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.preferences.locale, "de");
    assert_eq!(updated.preferences.theme, Theme::Dark);

    let err = resolver
        .update_preferences(
            account.id,
            Preferences {
                locale: " ".into(),
                theme: Theme::Light,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NotypeError::Validation { .. }));
}
