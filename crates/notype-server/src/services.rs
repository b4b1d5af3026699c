//! Component wiring on top of a live SurrealDB connection.

use notype_auth::identity::IdentityResolver;
use notype_auth::session::SessionAuthority;
use notype_db::repository::{
    SurrealAccountRepository, SurrealHistoryRepository, SurrealSessionRepository,
};
use notype_db::{DbManager, run_migrations};
use notype_ledger::HistoryLedger;
use surrealdb::engine::remote::ws::Client;
use tracing::info;

use crate::config::Config;

pub type Accounts = SurrealAccountRepository<Client>;
pub type Sessions = SurrealSessionRepository<Client>;
pub type History = SurrealHistoryRepository<Client>;

/// The three components handed to the request layer.
pub struct Services {
    pub db: DbManager,
    pub identity: IdentityResolver<Accounts>,
    pub sessions: SessionAuthority<Accounts, Sessions>,
    pub ledger: HistoryLedger<History>,
}

impl Services {
    /// Connect, migrate and build every component from `config`.
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let db = DbManager::connect(&config.db_config()).await?;
        run_migrations(db.client()).await?;

        let client = db.client().clone();
        let identity = IdentityResolver::with_argon2(
            SurrealAccountRepository::new(client.clone()),
            config.auth_config(),
        )?;
        let sessions = SessionAuthority::new(
            SurrealAccountRepository::new(client.clone()),
            SurrealSessionRepository::new(client.clone()),
            config.session_config(),
            config.cookie_policy(),
        );
        let ledger = HistoryLedger::new(SurrealHistoryRepository::new(client), config.ledger_config())?;

        info!(
            cookie_mode = %config.cookie_mode,
            session_ttl_secs = config.session_ttl_secs,
            history_limit = ledger.max_records(),
            "Services ready"
        );

        Ok(Self {
            db,
            identity,
            sessions,
            ledger,
        })
    }
}
