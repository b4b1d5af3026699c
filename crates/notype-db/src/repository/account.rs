//! SurrealDB implementation of [`AccountRepository`].
//!
//! Email uniqueness is a unique index on `account.email`. Federated ids
//! are claimed by creating `federated_identity:<id>` records: the record
//! id makes the claim unique, and accounts without a federated id are
//! never indexed. The claim and `account.federated_id` are always written
//! in the same transaction, so no reader ever sees one without the other.

use chrono::{DateTime, Utc};
use notype_core::error::NotypeResult;
use notype_core::models::account::{Account, CreateAccount, Preferences};
use notype_core::repository::AccountRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

const ENTITY: &str = "account";

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct AccountRow {
    email: String,
    federated_id: Option<String>,
    display_name: String,
    credential_hash: Option<String>,
    avatar_url: String,
    preferences: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct AccountRowWithId {
    record_id: String,
    email: String,
    federated_id: Option<String>,
    display_name: String,
    credential_hash: Option<String>,
    avatar_url: String,
    preferences: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_preferences(value: serde_json::Value) -> Result<Preferences, DbError> {
    serde_json::from_value(value).map_err(|e| DbError::corrupt(ENTITY, format!("preferences: {e}")))
}

impl AccountRow {
    fn try_into_account(self, id: Uuid) -> Result<Account, DbError> {
        Ok(Account {
            id,
            email: self.email,
            federated_id: self.federated_id,
            display_name: self.display_name,
            credential_hash: self.credential_hash,
            avatar_url: self.avatar_url,
            preferences: parse_preferences(self.preferences)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl AccountRowWithId {
    fn try_into_account(self) -> Result<Account, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::corrupt(ENTITY, format!("invalid UUID: {e}")))?;
        Ok(Account {
            id,
            email: self.email,
            federated_id: self.federated_id,
            display_name: self.display_name,
            credential_hash: self.credential_hash,
            avatar_url: self.avatar_url,
            preferences: parse_preferences(self.preferences)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Account repository.
#[derive(Clone)]
pub struct SurrealAccountRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAccountRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: Uuid) -> Result<Account, DbError> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('account', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        row.try_into_account(id)
    }

    async fn federated_id_taken(&self, federated_id: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query("SELECT VALUE account_id FROM type::record('federated_identity', $federated_id)")
            .bind(("federated_id", federated_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let owners: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(!owners.is_empty())
    }

    /// Turn an unclassified transaction failure into a conflict when the
    /// store shows the email or federated id is already taken.
    ///
    /// A failed transaction reports "not executed" on every statement it
    /// cancelled, so the first error is not always the one that failed.
    async fn explain(
        &self,
        err: surrealdb::Error,
        email: Option<&str>,
        federated_id: Option<&str>,
    ) -> DbError {
        let err = match DbError::from_query(ENTITY, err) {
            DbError::Query(detail) => detail,
            classified => return classified,
        };

        if let Some(email) = email
            && self.find_one("email", email).await.is_ok()
        {
            return DbError::Conflict {
                entity: ENTITY.into(),
                detail: format!("email {email} is taken"),
            };
        }
        if let Some(federated_id) = federated_id
            && self.federated_id_taken(federated_id).await.unwrap_or(false)
        {
            return DbError::Conflict {
                entity: "federated_identity".into(),
                detail: format!("{federated_id} is already claimed"),
            };
        }

        DbError::Query(err)
    }

    async fn find_one(&self, field: &'static str, value: &str) -> Result<Account, DbError> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM account \
             WHERE {field} = $value LIMIT 1"
        );

        let mut result = self
            .db
            .query(&query)
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: format!("{field}={value}"),
        })?;

        row.try_into_account()
    }
}

impl<C: Connection> AccountRepository for SurrealAccountRepository<C> {
    async fn create(&self, input: CreateAccount) -> NotypeResult<Account> {
        let id = Uuid::new_v4();

        let preferences = serde_json::to_value(&input.preferences)
            .map_err(|e| DbError::corrupt(ENTITY, format!("preferences: {e}")))?;

        // The account and its federated claim commit together or not at
        // all; a lost race leaves nothing behind.
        let outcome = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('account', $id) SET \
                     email = $email, \
                     federated_id = $federated_id, \
                     display_name = $display_name, \
                     credential_hash = $credential_hash, \
                     avatar_url = $avatar_url, \
                     preferences = $preferences; \
                 IF $federated_id != NONE { \
                     CREATE type::record('federated_identity', $federated_id) \
                         SET account_id = $id; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("email", input.email.clone()))
            .bind(("federated_id", input.federated_id.clone()))
            .bind(("display_name", input.display_name))
            .bind(("credential_hash", input.credential_hash))
            .bind(("avatar_url", input.avatar_url))
            .bind(("preferences", preferences))
            .await
            .and_then(|response| response.check());

        if let Err(err) = outcome {
            let err = self
                .explain(err, Some(&input.email), input.federated_id.as_deref())
                .await;
            return Err(err.into());
        }

        Ok(self.fetch(id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> NotypeResult<Account> {
        Ok(self.fetch(id).await?)
    }

    async fn get_by_email(&self, email: &str) -> NotypeResult<Account> {
        Ok(self.find_one("email", email).await?)
    }

    async fn get_by_federated_id(&self, federated_id: &str) -> NotypeResult<Account> {
        Ok(self.find_one("federated_id", federated_id).await?)
    }

    async fn link_federated(&self, id: Uuid, federated_id: &str) -> NotypeResult<Account> {
        // The unique index on `federated_identity.account_id` also rejects
        // a second claim for an already linked account.
        let outcome = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $linked = (UPDATE type::record('account', $id) SET \
                     federated_id = $federated_id, updated_at = time::now() \
                     WHERE federated_id = NONE); \
                 IF array::len($linked) = 0 { \
                     THROW 'account is missing or already linked'; \
                 }; \
                 CREATE type::record('federated_identity', $federated_id) \
                     SET account_id = $id; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("federated_id", federated_id.to_string()))
            .await
            .and_then(|response| response.check());

        if let Err(err) = outcome {
            let current = self.fetch(id).await?;
            if current.federated_id.is_some() {
                return Err(DbError::Conflict {
                    entity: ENTITY.into(),
                    detail: format!("account {id} is already linked"),
                }
                .into());
            }
            return Err(self.explain(err, None, Some(federated_id)).await.into());
        }

        Ok(self.fetch(id).await?)
    }

    async fn update_preferences(&self, id: Uuid, preferences: Preferences) -> NotypeResult<Account> {
        let id_str = id.to_string();
        let preferences = serde_json::to_value(&preferences)
            .map_err(|e| DbError::corrupt(ENTITY, format!("preferences: {e}")))?;

        let result = self
            .db
            .query(
                "UPDATE type::record('account', $id) SET \
                 preferences = $preferences, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("preferences", preferences))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_query(ENTITY, e))?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.try_into_account(id)?)
    }
}
