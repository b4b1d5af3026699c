//! SurrealDB implementation of [`HistoryRepository`].
//!
//! Recency order is `created_at DESC, seq DESC`. `seq` is assigned inside
//! the inserting statement as one more than the account's current
//! maximum, so it grows in commit order even when two inserts share a
//! timestamp.

use chrono::{DateTime, Utc};
use notype_core::error::NotypeResult;
use notype_core::models::history::{Category, CreateHistoryRecord, HistoryRecord};
use notype_core::repository::HistoryRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

const ENTITY: &str = "history";

#[derive(Debug, SurrealValue)]
struct HistoryRow {
    account_id: String,
    payload_in: String,
    payload_out: String,
    category: String,
    seq: u64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct HistoryRowWithId {
    record_id: String,
    account_id: String,
    payload_in: String,
    payload_out: String,
    category: String,
    seq: u64,
    created_at: DateTime<Utc>,
}

fn parse_category(raw: &str) -> Result<Category, DbError> {
    raw.parse()
        .map_err(|_| DbError::corrupt(ENTITY, format!("unknown category: {raw}")))
}

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::corrupt(ENTITY, format!("invalid {field}: {e}")))
}

impl HistoryRow {
    fn try_into_record(self, id: Uuid) -> Result<HistoryRecord, DbError> {
        Ok(HistoryRecord {
            id,
            account_id: parse_uuid("account_id", &self.account_id)?,
            payload_in: self.payload_in,
            payload_out: self.payload_out,
            category: parse_category(&self.category)?,
            created_at: self.created_at,
            seq: self.seq,
        })
    }
}

impl HistoryRowWithId {
    fn try_into_record(self) -> Result<HistoryRecord, DbError> {
        Ok(HistoryRecord {
            id: parse_uuid("record id", &self.record_id)?,
            account_id: parse_uuid("account_id", &self.account_id)?,
            payload_in: self.payload_in,
            payload_out: self.payload_out,
            category: parse_category(&self.category)?,
            created_at: self.created_at,
            seq: self.seq,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the History repository.
#[derive(Clone)]
pub struct SurrealHistoryRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealHistoryRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> HistoryRepository for SurrealHistoryRepository<C> {
    async fn insert(&self, input: CreateHistoryRecord) -> NotypeResult<HistoryRecord> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('history', $id) SET \
                 account_id = $account_id, \
                 payload_in = $payload_in, \
                 payload_out = $payload_out, \
                 category = $category, \
                 seq = math::max(array::concat([0], \
                     (SELECT VALUE seq FROM history WHERE account_id = $account_id))) + 1",
            )
            .bind(("id", id_str.clone()))
            .bind(("account_id", input.account_id.to_string()))
            .bind(("payload_in", input.payload_in))
            .bind(("payload_out", input.payload_out))
            .bind(("category", input.category.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_query(ENTITY, e))?;

        let rows: Vec<HistoryRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.try_into_record(id)?)
    }

    async fn list_recent(&self, account_id: Uuid, limit: u64) -> NotypeResult<Vec<HistoryRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM history \
                 WHERE account_id = $account_id \
                 ORDER BY created_at DESC, seq DESC \
                 LIMIT $limit",
            )
            .bind(("account_id", account_id.to_string()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<HistoryRowWithId> = result.take(0).map_err(DbError::from)?;

        let records = rows
            .into_iter()
            .map(|row| row.try_into_record())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(records)
    }

    async fn retain_recent(&self, account_id: Uuid, keep: u64) -> NotypeResult<()> {
        // Selecting the survivors and deleting the rest share one
        // transaction, so the delete never acts on a stale keep set.
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 LET $survivors = (SELECT VALUE id FROM ( \
                     SELECT id, created_at, seq FROM history \
                     WHERE account_id = $account_id \
                     ORDER BY created_at DESC, seq DESC \
                     LIMIT $keep)); \
                 DELETE history WHERE account_id = $account_id \
                     AND id NOT IN $survivors; \
                 COMMIT TRANSACTION;",
            )
            .bind(("account_id", account_id.to_string()))
            .bind(("keep", keep))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_query(ENTITY, e))?;

        Ok(())
    }

    async fn count(&self, account_id: Uuid) -> NotypeResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM history \
                 WHERE account_id = $account_id GROUP ALL",
            )
            .bind(("account_id", account_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
