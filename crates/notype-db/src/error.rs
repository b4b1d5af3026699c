//! Database-specific error types and conversions.

use notype_core::error::NotypeError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A unique index or record id was already taken.
    #[error("Unique constraint violated on {entity}: {detail}")]
    Conflict { entity: String, detail: String },

    /// Optimistic transaction lost against a concurrent writer.
    #[error("Write conflict on {entity}: {detail}")]
    WriteConflict { entity: String, detail: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Corrupt row in {entity}: {detail}")]
    Corrupt { entity: String, detail: String },
}

impl DbError {
    /// Classify an error returned by a statement touching `entity`.
    ///
    /// SurrealDB reports constraint and transaction failures as plain
    /// query errors, so the message is the only discriminator.
    pub fn from_query(entity: &str, err: surrealdb::Error) -> Self {
        let detail = err.to_string();
        let lower = detail.to_lowercase();
        if lower.contains("already contains") || lower.contains("already exists") {
            DbError::Conflict {
                entity: entity.into(),
                detail,
            }
        } else if lower.contains("conflict") || lower.contains("can be retried") {
            DbError::WriteConflict {
                entity: entity.into(),
                detail,
            }
        } else {
            DbError::Query(detail)
        }
    }

    pub(crate) fn corrupt(entity: &str, detail: impl std::fmt::Display) -> Self {
        DbError::Corrupt {
            entity: entity.into(),
            detail: detail.to_string(),
        }
    }
}

impl From<DbError> for NotypeError {
    fn from(err: DbError) -> Self {
        match err {
            // Transaction conflicts can also surface when the response
            // arrives, before any statement result is checked.
            DbError::Surreal(e) => match DbError::from_query("record", e) {
                DbError::Query(detail) => NotypeError::Persistence(format!("SurrealDB error: {detail}")),
                classified => classified.into(),
            },
            DbError::NotFound { entity, id } => NotypeError::NotFound { entity, id },
            DbError::Conflict { entity, .. } | DbError::WriteConflict { entity, .. } => {
                NotypeError::Conflict { entity }
            }
            other => NotypeError::Persistence(other.to_string()),
        }
    }
}
