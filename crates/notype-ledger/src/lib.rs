//! notype Ledger: bounded, newest-first generation history per account.

pub mod config;
pub mod ledger;

pub use config::LedgerConfig;
pub use ledger::{HistoryLedger, Recorded};
