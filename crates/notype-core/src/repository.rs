//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Uniqueness violations are
//! reported as [`NotypeError::Conflict`] so callers can tell them apart
//! from infrastructure failures.
//!
//! [`NotypeError::Conflict`]: crate::error::NotypeError::Conflict

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::NotypeResult;
use crate::models::{
    account::{Account, CreateAccount, Preferences},
    history::{CreateHistoryRecord, HistoryRecord},
    session::{CreateSession, Session},
};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub trait AccountRepository: Send + Sync {
    /// Insert a new account. Fails with `Conflict` when the email or the
    /// federated id is already taken; nothing is left behind in that case.
    fn create(&self, input: CreateAccount) -> impl Future<Output = NotypeResult<Account>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = NotypeResult<Account>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = NotypeResult<Account>> + Send;
    fn get_by_federated_id(
        &self,
        federated_id: &str,
    ) -> impl Future<Output = NotypeResult<Account>> + Send;
    /// Attach a federated id to an account that has none yet.
    ///
    /// Fails with `Conflict` if the federated id belongs to another
    /// account or the account is already linked.
    fn link_federated(
        &self,
        id: Uuid,
        federated_id: &str,
    ) -> impl Future<Output = NotypeResult<Account>> + Send;
    fn update_preferences(
        &self,
        id: Uuid,
        preferences: Preferences,
    ) -> impl Future<Output = NotypeResult<Account>> + Send;
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = NotypeResult<Session>> + Send;
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = NotypeResult<Session>> + Send;
    /// Move the expiry of a live session.
    fn touch(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = NotypeResult<()>> + Send;
    /// Delete the session with this token hash. Absent sessions are not
    /// an error.
    fn delete_by_token_hash(&self, token_hash: &str)
    -> impl Future<Output = NotypeResult<()>> + Send;
    /// Delete all sessions of an account (e.g. on credential change).
    fn delete_for_account(&self, account_id: Uuid)
    -> impl Future<Output = NotypeResult<()>> + Send;
    /// Remove all sessions expired at `now`; returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> impl Future<Output = NotypeResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Generation history
// ---------------------------------------------------------------------------

pub trait HistoryRepository: Send + Sync {
    /// Insert a record, stamping `created_at` and the next per-account
    /// `seq` in the same store operation.
    fn insert(
        &self,
        input: CreateHistoryRecord,
    ) -> impl Future<Output = NotypeResult<HistoryRecord>> + Send;
    /// The `limit` newest records of an account, newest first.
    fn list_recent(
        &self,
        account_id: Uuid,
        limit: u64,
    ) -> impl Future<Output = NotypeResult<Vec<HistoryRecord>>> + Send;
    /// Atomically delete every record of the account outside its `keep`
    /// newest.
    fn retain_recent(
        &self,
        account_id: Uuid,
        keep: u64,
    ) -> impl Future<Output = NotypeResult<()>> + Send;
    fn count(&self, account_id: Uuid) -> impl Future<Output = NotypeResult<u64>> + Send;
}
