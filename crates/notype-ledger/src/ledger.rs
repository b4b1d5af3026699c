//! The bounded history ledger.
//!
//! Every `record` inserts first and trims second. The trim is a single
//! store transaction that keeps the account's N newest records by
//! `(created_at DESC, seq DESC)` and deletes the rest, so concurrent
//! recordings for one account converge on exactly N survivors and never
//! touch another account's rows.

use notype_core::error::{NotypeError, NotypeResult};
use notype_core::models::history::{Category, CreateHistoryRecord, HistoryRecord};
use notype_core::repository::HistoryRepository;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::LedgerConfig;

/// Outcome of [`HistoryLedger::record`].
///
/// The insert succeeded whenever a `Recorded` is returned. `trim` reports
/// whether the retention limit was enforced afterwards; on `Err` the
/// account may briefly hold more than N records until the next `record`
/// or [`HistoryLedger::reconcile`].
#[derive(Debug)]
pub struct Recorded {
    pub record: HistoryRecord,
    pub trim: NotypeResult<()>,
}

/// A conflict that outlasted every retry is a store fault, not a
/// uniqueness violation the caller could act on.
fn exhausted(op: &str, err: NotypeError) -> NotypeError {
    match err {
        NotypeError::Conflict { entity } => {
            NotypeError::Persistence(format!("{entity} {op} kept conflicting"))
        }
        other => other,
    }
}

pub struct HistoryLedger<H: HistoryRepository> {
    history: H,
    config: LedgerConfig,
}

impl<H: HistoryRepository> HistoryLedger<H> {
    pub fn new(history: H, config: LedgerConfig) -> NotypeResult<Self> {
        if config.max_records == 0 {
            return Err(NotypeError::Validation {
                message: "history limit must be at least 1".into(),
            });
        }
        Ok(Self { history, config })
    }

    pub fn max_records(&self) -> u64 {
        self.config.max_records
    }

    /// Append a generation to the account's history and enforce the
    /// retention limit.
    pub async fn record(
        &self,
        account_id: Uuid,
        payload_in: impl Into<String>,
        payload_out: impl Into<String>,
        category: Category,
    ) -> NotypeResult<Recorded> {
        let input = CreateHistoryRecord {
            account_id,
            payload_in: payload_in.into(),
            payload_out: payload_out.into(),
            category,
        };

        // Only a lost write race is retried: the store guarantees nothing
        // was written in that case.
        let record = self
            .attempt("insert", |e| matches!(e, NotypeError::Conflict { .. }), || {
                self.history.insert(input.clone())
            })
            .await
            .map_err(|e| exhausted("insert", e))?;

        debug!(%account_id, record_id = %record.id, seq = record.seq, "History recorded");

        let trim = self.reconcile(account_id).await;
        if let Err(e) = &trim {
            warn!(%account_id, error = %e, "History trim failed; limit enforced on next write");
        }

        Ok(Recorded { record, trim })
    }

    /// The retained records of an account, newest first.
    pub async fn list(&self, account_id: Uuid) -> NotypeResult<Vec<HistoryRecord>> {
        self.history
            .list_recent(account_id, self.config.max_records)
            .await
    }

    /// Delete everything outside the account's N newest records.
    ///
    /// Idempotent; safe to call at any time.
    pub async fn reconcile(&self, account_id: Uuid) -> NotypeResult<()> {
        let keep = self.config.max_records;
        self.attempt("trim", NotypeError::is_retryable, || {
            self.history.retain_recent(account_id, keep)
        })
        .await
        .map_err(|e| exhausted("trim", e))
    }

    async fn attempt<T, F, Fut>(
        &self,
        op: &'static str,
        retry_on: impl Fn(&NotypeError) -> bool,
        mut run: F,
    ) -> NotypeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NotypeResult<T>>,
    {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match run().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && retry_on(&e) => {
                    debug!(op, attempt, error = %e, "Retrying history write");
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
