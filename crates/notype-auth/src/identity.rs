//! Identity resolution: reconciles federated profiles and local
//! credentials into one canonical [`Account`].
//!
//! Email and federated id uniqueness are enforced by the repository;
//! this layer only decides which account an assertion maps to, and turns
//! store conflicts into the right error kind.

use std::sync::{Arc, LazyLock};

use notype_core::error::{NotypeError, NotypeResult};
use notype_core::models::account::{Account, CreateAccount, FederatedProfile, Preferences};
use notype_core::provider::ProfileProvider;
use notype_core::repository::AccountRepository;
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password::{Argon2Hasher, SecretHasher};

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

static EMAIL_SHAPE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN).ok());

/// Hashed in place of a missing account so unknown emails cost the same
/// as wrong passwords.
const TIMING_DECOY: &str = "notype-timing-decoy";

/// Normalize an email for lookup and uniqueness checks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email shape check on already-normalized input.
pub fn valid_email(normalized: &str) -> bool {
    EMAIL_SHAPE
        .as_ref()
        .is_some_and(|regex| regex.is_match(normalized))
}

/// Capitalized local part of an email, used when no name is supplied.
pub fn default_display_name(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut chars = local.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => email.to_string(),
    }
}

/// Deterministic avatar URI for an account without a provider avatar.
pub fn derived_avatar_url(email: &str) -> String {
    let digest = hex::encode(Sha256::digest(email.as_bytes()));
    format!("https://www.gravatar.com/avatar/{digest}?d=identicon")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolves credential assertions into accounts.
///
/// Generic over the account repository and the hasher so the resolver
/// has no dependency on the database crate.
pub struct IdentityResolver<A: AccountRepository, H: SecretHasher = Argon2Hasher> {
    accounts: A,
    hasher: Arc<H>,
    config: AuthConfig,
    decoy_hash: OnceCell<String>,
}

impl<A: AccountRepository> IdentityResolver<A, Argon2Hasher> {
    /// Resolver using Argon2id with the cost configured in `config`.
    pub fn with_argon2(accounts: A, config: AuthConfig) -> NotypeResult<Self> {
        let hasher = Argon2Hasher::new(&config)?;
        Ok(Self::new(accounts, hasher, config))
    }
}

impl<A: AccountRepository, H: SecretHasher> IdentityResolver<A, H> {
    pub fn new(accounts: A, hasher: H, config: AuthConfig) -> Self {
        Self {
            accounts,
            hasher: Arc::new(hasher),
            config,
            decoy_hash: OnceCell::new(),
        }
    }

    /// Read-only access to the account store.
    pub fn accounts(&self) -> &A {
        &self.accounts
    }

    // -------------------------------------------------------------------
    // Federated path
    // -------------------------------------------------------------------

    /// Reconcile a verified provider profile with local state.
    ///
    /// Known federated id: returned unchanged (first-seen name and avatar
    /// stick). Known email: linked. Otherwise a new account is created.
    pub async fn resolve_federated(&self, profile: FederatedProfile) -> NotypeResult<Account> {
        let external_id = profile.external_id.trim().to_string();
        if external_id.is_empty() {
            return Err(NotypeError::IncompleteProfile {
                reason: "missing provider identifier".into(),
            });
        }

        match self.accounts.get_by_federated_id(&external_id).await {
            Ok(account) => {
                debug!(account_id = %account.id, "Federated id already known");
                return Ok(account);
            }
            Err(NotypeError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let email = match non_empty(profile.email) {
            Some(raw) => normalize_email(&raw),
            None => {
                return Err(NotypeError::IncompleteProfile {
                    reason: "provider profile has no email".into(),
                });
            }
        };
        if !valid_email(&email) {
            return Err(NotypeError::IncompleteProfile {
                reason: "provider email is malformed".into(),
            });
        }

        match self.accounts.get_by_email(&email).await {
            Ok(existing) => return self.link(existing, &external_id).await,
            Err(NotypeError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let display_name =
            non_empty(profile.display_name).unwrap_or_else(|| default_display_name(&email));
        let avatar_url = non_empty(profile.avatar_url).unwrap_or_else(|| derived_avatar_url(&email));

        let account = self
            .accounts
            .create(CreateAccount {
                email,
                federated_id: Some(external_id),
                display_name,
                credential_hash: None,
                avatar_url,
                preferences: Preferences::default(),
            })
            .await
            .inspect_err(|e| {
                if matches!(e, NotypeError::Conflict { .. }) {
                    warn!("Concurrent federated sign-up lost the uniqueness race");
                }
            })?;

        info!(account_id = %account.id, "Created federated account");
        Ok(account)
    }

    async fn link(&self, existing: Account, external_id: &str) -> NotypeResult<Account> {
        if let Some(current) = &existing.federated_id {
            if current == external_id {
                return Ok(existing);
            }
            // A federated id is never replaced once set.
            warn!(account_id = %existing.id, "Email already linked to another federated id");
            return Err(NotypeError::Conflict {
                entity: "account".into(),
            });
        }

        let linked = self.accounts.link_federated(existing.id, external_id).await?;
        info!(account_id = %linked.id, "Linked federated id to existing account");
        Ok(linked)
    }

    /// Fetch the profile of a completed handshake from `provider` and
    /// resolve it. A provider that does not answer within the configured
    /// timeout yields [`NotypeError::UpstreamTimeout`].
    pub async fn resolve_with_provider<P: ProfileProvider>(
        &self,
        provider: &P,
        handshake: &str,
    ) -> NotypeResult<Account> {
        let profile = tokio::time::timeout(
            self.config.provider_timeout,
            provider.fetch_profile(handshake),
        )
        .await
        .map_err(|_| {
            warn!(provider = provider.name(), "Identity provider timed out");
            NotypeError::UpstreamTimeout(format!("{} profile fetch", provider.name()))
        })??;

        self.resolve_federated(profile).await
    }

    // -------------------------------------------------------------------
    // Local path
    // -------------------------------------------------------------------

    /// Verify an email/password pair.
    ///
    /// Unknown email, federated-only account and wrong password all fail
    /// with the same [`NotypeError::InvalidCredentials`].
    pub async fn resolve_local(&self, email: &str, secret: &str) -> NotypeResult<Account> {
        let email = normalize_email(email);

        let account = match self.accounts.get_by_email(&email).await {
            Ok(account) => account,
            Err(NotypeError::NotFound { .. }) => {
                self.burn_verification(secret).await;
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let Some(hash) = account.credential_hash.clone() else {
            self.burn_verification(secret).await;
            return Err(AuthError::InvalidCredentials.into());
        };

        if !self.verify_secret(secret.to_string(), hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(account)
    }

    /// Create an account with a local password.
    pub async fn register_local(
        &self,
        email: &str,
        secret: &str,
        display_name: &str,
    ) -> NotypeResult<Account> {
        let email = normalize_email(email);
        let display_name = display_name.trim().to_string();

        if !valid_email(&email) {
            return Err(NotypeError::Validation {
                message: "email is not well-formed".into(),
            });
        }
        if secret.chars().count() < self.config.min_password_length {
            return Err(NotypeError::Validation {
                message: format!(
                    "password must be at least {} characters",
                    self.config.min_password_length
                ),
            });
        }
        if display_name.is_empty() {
            return Err(NotypeError::Validation {
                message: "display name must not be empty".into(),
            });
        }

        match self.accounts.get_by_email(&email).await {
            Ok(_) => return Err(NotypeError::DuplicateEmail),
            Err(NotypeError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        // Hash before touching the store: a hashing failure leaves nothing
        // behind.
        let credential_hash = self.hash_secret(secret.to_string()).await?;
        let avatar_url = derived_avatar_url(&email);

        let created = self
            .accounts
            .create(CreateAccount {
                email: email.clone(),
                federated_id: None,
                display_name,
                credential_hash: Some(credential_hash),
                avatar_url,
                preferences: Preferences::default(),
            })
            .await;

        match created {
            Ok(account) => {
                info!(account_id = %account.id, "Registered local account");
                Ok(account)
            }
            Err(NotypeError::Conflict { entity }) => {
                // Either the unique index fired or the write lost an
                // optimistic race; only an existing email means duplicate.
                match self.accounts.get_by_email(&email).await {
                    Ok(_) => Err(NotypeError::DuplicateEmail),
                    Err(_) => Err(NotypeError::Conflict { entity }),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the preference map of an account.
    pub async fn update_preferences(
        &self,
        account_id: Uuid,
        preferences: Preferences,
    ) -> NotypeResult<Account> {
        if preferences.locale.trim().is_empty() {
            return Err(NotypeError::Validation {
                message: "locale must not be empty".into(),
            });
        }
        self.accounts
            .update_preferences(account_id, preferences)
            .await
    }

    // -------------------------------------------------------------------
    // Hashing off the async scheduler
    // -------------------------------------------------------------------

    async fn hash_secret(&self, secret: String) -> NotypeResult<String> {
        let hasher = Arc::clone(&self.hasher);
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| AuthError::Task(e.to_string()))??;
        Ok(hash)
    }

    async fn verify_secret(&self, secret: String, hash: String) -> NotypeResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        let matched = tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
            .await
            .map_err(|e| AuthError::Task(e.to_string()))??;
        Ok(matched)
    }

    /// Spend one verification on a decoy hash. Failures are ignored; the
    /// caller already knows the answer.
    async fn burn_verification(&self, secret: &str) {
        let decoy = self
            .decoy_hash
            .get_or_try_init(|| self.hash_secret(TIMING_DECOY.to_string()))
            .await;
        if let Ok(hash) = decoy {
            let _ = self.verify_secret(secret.to_string(), hash.clone()).await;
        }
    }
}
