//! Authentication configuration.

use std::time::Duration;

/// Configuration for identity resolution and password hashing.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Optional pepper prepended to passwords before Argon2id hashing
    /// and verification.
    pub pepper: Option<String>,
    /// Minimum password length in characters (default: 6).
    pub min_password_length: usize,
    /// Argon2id memory cost in KiB (default: 19456 = 19 MiB).
    pub argon2_memory_kib: u32,
    /// Argon2id iterations (default: 2).
    pub argon2_iterations: u32,
    /// Argon2id lanes (default: 1).
    pub argon2_parallelism: u32,
    /// Upper bound for fetching a profile from an identity provider.
    pub provider_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            pepper: None,
            min_password_length: 6,
            argon2_memory_kib: 19456,
            argon2_iterations: 2,
            argon2_parallelism: 1,
            provider_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration for session lifetime.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session lifetime in seconds (default: 86_400 = 24 hours).
    pub ttl_secs: u64,
    /// Push the expiry forward by one ttl on every successful validation.
    pub sliding_expiration: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400,
            sliding_expiration: false,
        }
    }
}

/// Ten years; longer lifetimes are clamped.
const MAX_TTL_SECS: u64 = 10 * 365 * 86_400;

impl SessionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs.min(MAX_TTL_SECS) as i64)
    }

    /// Value for the cookie `Max-Age` attribute.
    pub fn max_age_secs(&self) -> u64 {
        self.ttl_secs.min(MAX_TTL_SECS)
    }
}
