//! Ledger configuration.

use std::time::Duration;

/// Retention and retry settings for the history ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Records kept per account (default: 5). Must be at least 1.
    pub max_records: u64,
    /// Attempts for a store write that lost a concurrent race, and for the
    /// trim after each insert (default: 3).
    pub max_attempts: u32,
    /// Pause between attempts.
    pub retry_backoff: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_records: 5,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(20),
        }
    }
}
