//! Password hashing and verification using Argon2id.
//!
//! Both operations are CPU-bound by design. Async callers must run them
//! through [`tokio::task::spawn_blocking`] so they never stall the
//! scheduler; see [`crate::identity::IdentityResolver`].

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::config::AuthConfig;
use crate::error::AuthError;

/// One-way hash and verification of local secrets.
pub trait SecretHasher: Send + Sync + 'static {
    /// Hash `secret` with a fresh random salt; returns a PHC string.
    fn hash(&self, secret: &str) -> Result<String, AuthError>;

    /// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or an error
    /// if the stored hash is malformed.
    fn verify(&self, secret: &str, hash: &str) -> Result<bool, AuthError>;
}

/// Argon2id hasher with configurable cost and an optional pepper.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: argon2::Params,
    pepper: Option<String>,
}

impl std::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Hasher")
            .field("params", &self.params)
            .field("pepper", &self.pepper.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Argon2Hasher {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let params = argon2::Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| AuthError::Parameters(e.to_string()))?;

        Ok(Self {
            params,
            pepper: config.pepper.clone(),
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            self.params.clone(),
        )
    }

    fn peppered(&self, secret: &str) -> Vec<u8> {
        match &self.pepper {
            Some(p) => format!("{p}{secret}").into_bytes(),
            None => secret.as_bytes().to_vec(),
        }
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        let hash = self
            .argon2()
            .hash_password(&self.peppered(secret), &salt)
            .map_err(|e| AuthError::Crypto(format!("password hash error: {e}")))?;

        Ok(hash.to_string())
    }

    fn verify(&self, secret: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = argon2::PasswordHash::new(hash)
            .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

        // Cost parameters are read from the PHC string, so hashes made
        // under an older configuration still verify.
        match Argon2::default().verify_password(&self.peppered(secret), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(pepper: Option<&str>) -> AuthConfig {
        AuthConfig {
            pepper: pepper.map(Into::into),
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            ..AuthConfig::default()
        }
    }

    #[test]
    fn correct_password_matches() {
        let hasher = Argon2Hasher::new(&fast_config(None)).unwrap();
        let hash = hasher.hash("hunter2").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("hunter2", &hash).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hasher = Argon2Hasher::new(&fast_config(None)).unwrap();
        let hash = hasher.hash("hunter2").unwrap();
        assert!(!hasher.verify("wrong", &hash).unwrap());
    }

    #[test]
    fn salts_are_random() {
        let hasher = Argon2Hasher::new(&fast_config(None)).unwrap();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn pepper_is_applied() {
        let peppered = Argon2Hasher::new(&fast_config(Some("pepper!"))).unwrap();
        let plain = Argon2Hasher::new(&fast_config(None)).unwrap();

        let hash = peppered.hash("hunter2").unwrap();
        assert!(peppered.verify("hunter2", &hash).unwrap());
        assert!(!plain.verify("hunter2", &hash).unwrap());
    }

    #[test]
    fn configured_cost_is_encoded_in_the_hash() {
        let hasher = Argon2Hasher::new(&fast_config(None)).unwrap();
        let hash = hasher.hash("hunter2").unwrap();
        assert!(hash.contains("m=1024,t=1,p=1"), "unexpected params in {hash}");
    }

    #[test]
    fn malformed_hash_returns_error() {
        let hasher = Argon2Hasher::new(&fast_config(None)).unwrap();
        assert!(hasher.verify("pw", "not-a-hash").is_err());
    }

    #[test]
    fn invalid_params_are_rejected() {
        let config = AuthConfig {
            argon2_memory_kib: 1,
            ..AuthConfig::default()
        };
        assert!(matches!(
            Argon2Hasher::new(&config),
            Err(AuthError::Parameters(_))
        ));
    }

    #[test]
    fn debug_output_hides_pepper() {
        let hasher = Argon2Hasher::new(&fast_config(Some("top-secret"))).unwrap();
        assert!(!format!("{hasher:?}").contains("top-secret"));
    }
}
