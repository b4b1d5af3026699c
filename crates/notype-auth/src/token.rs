//! Opaque session token generation and hashing.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Source of unguessable opaque tokens.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// 32 bytes from the thread-local CSPRNG, base64url-encoded without
/// padding (43 characters, 256 bits of entropy).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        let bytes: [u8; 32] = rand::Rng::random(&mut rng);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// SHA-256 hash of a raw session token, hex-encoded.
///
/// This is the value stored as `session.token_hash`; the raw token only
/// ever lives in the client cookie.
pub fn hash_session_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
