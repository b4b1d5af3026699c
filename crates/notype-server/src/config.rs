//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;
use notype_auth::config::{AuthConfig, SessionConfig};
use notype_auth::cookie::{CookiePolicy, DEFAULT_COOKIE_NAME, DeploymentMode};
use notype_db::DbConfig;
use notype_ledger::LedgerConfig;

/// Every flag can also be set through the environment variable shown in
/// `--help`.
#[derive(Debug, Parser)]
#[command(name = "notype-server")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// SurrealDB WebSocket address
    #[arg(long, env = "NOTYPE_DB_URL", default_value = "127.0.0.1:8000")]
    pub db_url: String,

    #[arg(long, env = "NOTYPE_DB_NAMESPACE", default_value = "notype")]
    pub db_namespace: String,

    #[arg(long, env = "NOTYPE_DB_DATABASE", default_value = "main")]
    pub db_database: String,

    #[arg(long, env = "NOTYPE_DB_USER", default_value = "root")]
    pub db_user: String,

    #[arg(long, env = "NOTYPE_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    pub db_password: String,

    /// Optional pepper mixed into every password hash
    #[arg(long, env = "NOTYPE_AUTH_PEPPER", hide_env_values = true)]
    pub auth_pepper: Option<String>,

    /// Session lifetime in seconds
    #[arg(long, env = "NOTYPE_SESSION_TTL_SECS", default_value_t = 86_400,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub session_ttl_secs: u64,

    /// Extend a session by one lifetime on every successful validation
    #[arg(long, env = "NOTYPE_SESSION_SLIDING", default_value_t = false,
          action = clap::ArgAction::Set)]
    pub session_sliding: bool,

    /// `cross-site` when API and UI live on different sites, else `same-site`
    #[arg(long, env = "NOTYPE_COOKIE_MODE", default_value = "same-site")]
    pub cookie_mode: DeploymentMode,

    /// API domain for the cookie `Domain` attribute (host-only if unset)
    #[arg(long, env = "NOTYPE_COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    #[arg(long, env = "NOTYPE_COOKIE_NAME", default_value = DEFAULT_COOKIE_NAME)]
    pub cookie_name: String,

    /// Mark same-site cookies `Secure` (cross-site cookies always are)
    #[arg(long, env = "NOTYPE_COOKIE_SECURE", default_value_t = false,
          action = clap::ArgAction::Set)]
    pub cookie_secure: bool,

    /// History records kept per account
    #[arg(long, env = "NOTYPE_HISTORY_LIMIT", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub history_limit: u64,

    /// Seconds between expired-session sweeps
    #[arg(long, env = "NOTYPE_SWEEP_INTERVAL_SECS", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            username: self.db_user.clone(),
            password: self.db_password.clone(),
            ..DbConfig::default()
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            pepper: self.auth_pepper.clone(),
            ..AuthConfig::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            ttl_secs: self.session_ttl_secs,
            sliding_expiration: self.session_sliding,
        }
    }

    pub fn cookie_policy(&self) -> CookiePolicy {
        let policy = match self.cookie_mode {
            DeploymentMode::CrossSite => CookiePolicy::cross_site(self.cookie_domain.clone()),
            DeploymentMode::SameSite => CookiePolicy {
                domain: self.cookie_domain.clone(),
                ..CookiePolicy::same_site(self.cookie_secure)
            },
        };
        policy.with_name(self.cookie_name.clone())
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            max_records: self.history_limit,
            ..LedgerConfig::default()
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
