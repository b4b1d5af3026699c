//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "accounts_and_sessions",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "generation_history",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: accounts, federated identities, sessions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Accounts
-- =======================================================================
DEFINE TABLE account SCHEMAFULL;
DEFINE FIELD email ON TABLE account TYPE string;
DEFINE FIELD federated_id ON TABLE account TYPE option<string>;
DEFINE FIELD display_name ON TABLE account TYPE string;
DEFINE FIELD credential_hash ON TABLE account TYPE option<string>;
DEFINE FIELD avatar_url ON TABLE account TYPE string;
DEFINE FIELD preferences ON TABLE account TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE account TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE account TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_account_email ON TABLE account COLUMNS email UNIQUE;
DEFINE INDEX idx_account_federated_id ON TABLE account \
    COLUMNS federated_id;

-- =======================================================================
-- Federated identity claims
-- The record id is the provider-scoped id, which makes federated ids
-- unique without indexing accounts that have none.
-- =======================================================================
DEFINE TABLE federated_identity SCHEMAFULL;
DEFINE FIELD account_id ON TABLE federated_identity TYPE string;
DEFINE FIELD created_at ON TABLE federated_identity TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_federated_identity_account ON TABLE federated_identity \
    COLUMNS account_id UNIQUE;

-- =======================================================================
-- Sessions
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD account_id ON TABLE session TYPE string;
DEFINE FIELD token_hash ON TABLE session TYPE string;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_token_hash ON TABLE session \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_session_account ON TABLE session COLUMNS account_id;
DEFINE INDEX idx_session_expires_at ON TABLE session COLUMNS expires_at;
";

// -----------------------------------------------------------------------
// Schema v2: bounded generation history
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
DEFINE TABLE history SCHEMAFULL;
DEFINE FIELD account_id ON TABLE history TYPE string;
DEFINE FIELD payload_in ON TABLE history TYPE string;
DEFINE FIELD payload_out ON TABLE history TYPE string;
DEFINE FIELD category ON TABLE history TYPE string \
    ASSERT $value IN ['natural', 'fluency', 'academic', 'creative'];
DEFINE FIELD seq ON TABLE history TYPE int;
DEFINE FIELD created_at ON TABLE history TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_history_account_recency ON TABLE history \
    COLUMNS account_id, created_at, seq;
";

/// Run all pending migrations against the given database.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query(
            "CREATE _migration SET version = $version, \
             name = $name",
        )
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!(
                "Failed to record migration v{}: {}",
                migration.version, e,
            ))
        })?;
    }

    info!(version = latest_version(), "Schema is up to date");
    Ok(())
}

fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
        assert_eq!(latest_version(), 2);
    }

    #[test]
    fn history_categories_match_the_domain_enum() {
        for category in notype_core::models::history::Category::ALL {
            assert!(
                SCHEMA_V2.contains(&format!("'{}'", category.as_str())),
                "category {category} missing from ASSERT"
            );
        }
    }
}
