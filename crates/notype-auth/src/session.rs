//! Session authority: issues, validates and destroys opaque session
//! tokens backed by server-side session records.
//!
//! The raw token only ever lives in the client cookie. The store keeps
//! its SHA-256 digest, so a leaked session table cannot be replayed.

use chrono::{DateTime, Utc};
use notype_core::error::{NotypeError, NotypeResult};
use notype_core::models::account::Account;
use notype_core::models::session::CreateSession;
use notype_core::repository::{AccountRepository, SessionRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::cookie::CookiePolicy;
use crate::token::{RandomTokenGenerator, TokenGenerator, hash_session_token};

/// Result of a successful [`SessionAuthority::issue`].
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Raw token to hand to the client. Not recoverable afterwards.
    pub token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    /// Ready-to-send `Set-Cookie` header value.
    pub set_cookie: String,
}

pub struct SessionAuthority<A, S, T = RandomTokenGenerator>
where
    A: AccountRepository,
    S: SessionRepository,
    T: TokenGenerator,
{
    accounts: A,
    sessions: S,
    tokens: T,
    config: SessionConfig,
    cookie: CookiePolicy,
}

impl<A, S> SessionAuthority<A, S, RandomTokenGenerator>
where
    A: AccountRepository,
    S: SessionRepository,
{
    pub fn new(accounts: A, sessions: S, config: SessionConfig, cookie: CookiePolicy) -> Self {
        Self::with_token_generator(accounts, sessions, RandomTokenGenerator, config, cookie)
    }
}

impl<A, S, T> SessionAuthority<A, S, T>
where
    A: AccountRepository,
    S: SessionRepository,
    T: TokenGenerator,
{
    pub fn with_token_generator(
        accounts: A,
        sessions: S,
        tokens: T,
        config: SessionConfig,
        cookie: CookiePolicy,
    ) -> Self {
        Self {
            accounts,
            sessions,
            tokens,
            config,
            cookie,
        }
    }

    pub fn cookie_policy(&self) -> &CookiePolicy {
        &self.cookie
    }

    /// Open a session for `account_id` and render its cookie.
    pub async fn issue(&self, account_id: Uuid) -> NotypeResult<IssuedSession> {
        let token = self.tokens.generate();
        let expires_at = Utc::now() + self.config.ttl();

        let session = self
            .sessions
            .create(CreateSession {
                account_id,
                token_hash: hash_session_token(&token),
                expires_at,
            })
            .await?;

        info!(%account_id, session_id = %session.id, "Session issued");

        let set_cookie = self
            .cookie
            .session_cookie(&token, self.config.max_age_secs());

        Ok(IssuedSession {
            token,
            session_id: session.id,
            expires_at: session.expires_at,
            set_cookie,
        })
    }

    /// Resolve a presented token to its account.
    ///
    /// Unknown, expired and orphaned tokens all yield `Ok(None)`; only
    /// store failures are errors.
    pub async fn validate(&self, token: &str) -> NotypeResult<Option<Account>> {
        if token.is_empty() {
            return Ok(None);
        }

        let session = match self
            .sessions
            .get_by_token_hash(&hash_session_token(token))
            .await
        {
            Ok(session) => session,
            Err(NotypeError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        if session.is_expired_at(now) {
            debug!(session_id = %session.id, "Session expired");
            return Ok(None);
        }

        let account = match self.accounts.get_by_id(session.account_id).await {
            Ok(account) => account,
            Err(NotypeError::NotFound { .. }) => {
                warn!(session_id = %session.id, "Session refers to a missing account");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if self.config.sliding_expiration {
            // A failed extension leaves the current expiry in place.
            if let Err(e) = self.sessions.touch(session.id, now + self.config.ttl()).await {
                warn!(session_id = %session.id, error = %e, "Failed to extend session");
            }
        }

        Ok(Some(account))
    }

    /// Like [`validate`](Self::validate), but a missing session is an
    /// error.
    pub async fn require(&self, token: Option<&str>) -> NotypeResult<Account> {
        let Some(token) = token else {
            return Err(NotypeError::NotAuthenticated);
        };
        self.validate(token)
            .await?
            .ok_or(NotypeError::NotAuthenticated)
    }

    /// End the session behind `token`. Idempotent; returns the
    /// `Set-Cookie` value that clears the client cookie.
    pub async fn destroy(&self, token: &str) -> NotypeResult<String> {
        if !token.is_empty() {
            self.sessions
                .delete_by_token_hash(&hash_session_token(token))
                .await?;
        }
        Ok(self.cookie.clear_cookie())
    }

    /// End every session of an account.
    pub async fn destroy_all(&self, account_id: Uuid) -> NotypeResult<()> {
        self.sessions.delete_for_account(account_id).await?;
        info!(%account_id, "All sessions destroyed");
        Ok(())
    }

    /// Delete sessions that expired before now.
    pub async fn purge_expired(&self) -> NotypeResult<u64> {
        let removed = self.sessions.purge_expired(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Purged expired sessions");
        }
        Ok(removed)
    }
}
